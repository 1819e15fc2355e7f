use tokio::sync::oneshot;

use crate::types::{ChatCompletionRequest, ChatCompletionResponse};

/// Request sent to the inference thread
pub enum InferenceRequest {
    ChatCompletion {
        request: ChatCompletionRequest,
        response_tx: oneshot::Sender<eyre::Result<ChatCompletionResponse>>,
    },
}
