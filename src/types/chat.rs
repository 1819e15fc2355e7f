use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_max_tokens() -> usize {
    4095
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Message content is either a plain string or an ordered list of parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageUrl {
    /// Data URL carrying a base64 payload, e.g. `data:image/png;base64,...`
    pub url: String,
}

impl ChatCompletionRequest {
    /// Validate the request shape. Violations are client errors (400).
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 || self.max_tokens > 8192 {
            return Err(format!(
                "max_tokens must be between 1 and 8192, got {}",
                self.max_tokens
            ));
        }
        let system_count = self
            .messages
            .iter()
            .filter(|m| m.role == "system")
            .count();
        if system_count > 1 {
            return Err(format!(
                "conversation may contain at most one system message, got {}",
                system_count
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: usize,
    pub finish_reason: String,
    pub message: AssistantMessage,
    /// Always null; log-probabilities are never produced
    pub logprobs: Option<serde_json::Value>,
}

/// The assistant reply. The optional fields are always serialized as null:
/// this service never refuses, calls tools, or emits function calls.
#[derive(Debug, Serialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
    pub refusal: Option<serde_json::Value>,
    pub tool_calls: Option<serde_json::Value>,
    pub function_call: Option<serde_json::Value>,
}
