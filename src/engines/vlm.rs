//! VLM engine: owns the loaded model and turns chat requests into replies
//!
//! Initialization happens once per process on the inference thread; each
//! request is normalized, handed to the generation backend, and the reply is
//! wrapped into the OpenAI-style response.

use eyre::Result;

use crate::engines::device::{load_policy, select_device, AttentionMode, DeviceKind};
use crate::engines::llava::LlavaModel;
use crate::engines::model::{ChatModel, GenerationParams};
use crate::normalize::normalize_messages;
use crate::types::{
    AssistantMessage, ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ModelInfo,
};

pub struct VlmEngine {
    backend: Box<dyn ChatModel>,
    model_name: String,
    device: DeviceKind,
    is_quantized: bool,
}

impl VlmEngine {
    /// Select a device, derive the load policy, and load the model.
    /// Any failure here is fatal to startup.
    pub fn new(model_id: &str) -> Result<Self> {
        let (device, kind) = select_device();
        let is_quantized = is_quantized_model(model_id);
        let policy = load_policy(kind);
        tracing::info!(
            "Loading VLM model {} on {} (dtype {:?}, {} attention)",
            model_id,
            kind.as_str(),
            policy.dtype,
            match policy.attention {
                AttentionMode::Sdpa => "sdpa",
                AttentionMode::Eager => "eager",
            },
        );

        let backend = LlavaModel::load(model_id, &device, policy)?;
        tracing::info!("VLM model loaded successfully");

        Ok(Self {
            backend: Box::new(backend),
            model_name: model_id.to_string(),
            device: kind,
            is_quantized,
        })
    }

    #[cfg(test)]
    fn with_backend(backend: Box<dyn ChatModel>, model_name: &str, device: DeviceKind) -> Self {
        Self {
            backend,
            model_name: model_name.to_string(),
            device,
            is_quantized: false,
        }
    }

    /// Run one chat completion. The request is assumed shape-valid; decode
    /// and generation failures surface as errors with their cause message.
    pub fn chat(&mut self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let normalized = normalize_messages(&request.messages)?;
        let params = GenerationParams {
            temperature: request.temperature,
            seed: request.seed,
            max_tokens: request.max_tokens,
        };

        let reply = self.backend.generate(&normalized, &params)?;

        Ok(ChatCompletionResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: request.model.clone(),
            choices: vec![ChatChoice {
                index: 0,
                finish_reason: "stop".to_string(),
                message: AssistantMessage {
                    role: "assistant".to_string(),
                    content: reply,
                    refusal: None,
                    tool_calls: None,
                    function_call: None,
                },
                logprobs: None,
            }],
        })
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            model_name: self.model_name.clone(),
            device: self.device.as_str().to_string(),
            is_quantized: self.is_quantized,
        }
    }
}

/// Quantized variants are recognized by their id, e.g. `...-int4`.
fn is_quantized_model(model_id: &str) -> bool {
    let id = model_id.to_ascii_lowercase();
    id.contains("int4") || id.contains("4bit") || id.contains("int8")
}
