/// Configuration from environment
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub vlm_model: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            vlm_model: std::env::var("VLM_MODEL")
                .unwrap_or_else(|_| "llava-hf/llava-1.5-7b-hf".to_string()),
        }
    }
}
