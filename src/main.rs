//! vlm-api: OpenAI-compatible API server for a local vision-language model
//!
//! Provides endpoints for:
//! - POST /v1/chat/completions - multimodal (text + image) chat completions
//! - GET  /v1/model-info - loaded model, device, quantization
//! - GET  /health - liveness probe
//!
//! Note: the candle model doesn't implement Send/Sync, so requests reach it
//! over a channel to a dedicated inference thread.

use eyre::Context;
use salvo::prelude::*;
use tokio::sync::{mpsc, oneshot};

mod config;
mod error;
mod state;

mod engines;
mod handlers;
mod inference;
mod router;

mod normalize;
mod types;
mod utils;

use config::Config;
use inference::InferenceRequest;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vlm_api=info".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Starting vlm-api server on port {}", config.port);
    tracing::info!("Configured model: {}", config.vlm_model);

    let (inference_tx, inference_rx) = mpsc::channel::<InferenceRequest>(32);
    let (ready_tx, ready_rx) = oneshot::channel();

    // Spawn inference thread (owns the model)
    let config_clone = config.clone();
    std::thread::spawn(move || {
        inference::inference_thread(config_clone, inference_rx, ready_tx);
    });

    // Wait for the model to load; a load failure aborts startup. On success
    // the ready signal carries the model description served by /v1/model-info.
    let model_info = ready_rx
        .await
        .context("Failed to receive ready signal from inference thread")?
        .map_err(|e| e.wrap_err("Model initialization failed"))?;
    tracing::info!("Inference thread ready");

    let state = AppState {
        inference_tx,
        model_info,
    };
    let router = router::build_router(state);

    let listen_addr = format!("0.0.0.0:{}", config.port);
    let acceptor = TcpListener::new(&listen_addr).bind().await;

    tracing::info!("HTTP server listening on http://{}", listen_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /v1/chat/completions");
    tracing::info!("  GET  /v1/model-info");

    Server::new(acceptor).serve(router).await;

    Ok(())
}
