use tokio::sync::mpsc;

use crate::inference::InferenceRequest;
use crate::types::ModelInfo;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Channel to send requests to the inference thread
    pub inference_tx: mpsc::Sender<InferenceRequest>,
    /// Description of the loaded model, captured once at startup
    pub model_info: ModelInfo,
}
