use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::engines::vlm::VlmEngine;
use crate::types::ModelInfo;

use super::InferenceRequest;

/// Inference thread that owns the loaded model (the model is not Send/Sync,
/// so all generation runs here and requests arrive over the channel).
///
/// The ready signal carries the load result: on success the model description
/// for /v1/model-info (immutable after load), on failure the error, which is
/// fatal to startup and reported back to `main` instead of being retried.
pub fn inference_thread(
    config: Config,
    mut rx: mpsc::Receiver<InferenceRequest>,
    ready_tx: oneshot::Sender<eyre::Result<ModelInfo>>,
) {
    tracing::info!("Loading VLM model: {}", config.vlm_model);
    let mut engine = match VlmEngine::new(&config.vlm_model) {
        Ok(engine) => {
            let _ = ready_tx.send(Ok(engine.info()));
            engine
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    tracing::info!("Inference thread ready, processing requests...");

    // Requests are processed one at a time; concurrent HTTP requests queue
    // on the channel.
    while let Some(request) = rx.blocking_recv() {
        match request {
            InferenceRequest::ChatCompletion {
                request,
                response_tx,
            } => {
                let result = engine.chat(&request);
                let _ = response_tx.send(result);
            }
        }
    }

    tracing::info!("Inference thread shutting down");
}
