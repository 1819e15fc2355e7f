use serde::Serialize;

/// Response body for `GET /v1/model-info`
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    /// One of "cuda", "metal", "cpu"
    pub device: String,
    pub is_quantized: bool,
}
