use salvo::http::StatusCode;
use salvo::prelude::*;

use crate::error::render_detail;
use crate::inference::InferenceRequest;
use crate::types::ChatCompletionRequest;

use super::helpers::{get_state, send_and_wait};

/// Request body limit; inline base64 images can be large
const MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

/// POST /v1/chat/completions - chat completion against the loaded VLM
#[handler]
pub async fn chat_completions(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), StatusError> {
    let state = get_state(depot)?;

    let request: ChatCompletionRequest = match req.parse_json_with_max_size(MAX_BODY_SIZE).await {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("Failed to parse chat request: {}", e);
            render_detail(
                res,
                StatusCode::BAD_REQUEST,
                format!("invalid request body: {}", e),
            );
            return Ok(());
        }
    };

    if let Err(reason) = request.validate() {
        render_detail(res, StatusCode::BAD_REQUEST, reason);
        return Ok(());
    }

    let result = send_and_wait(&state.inference_tx, |tx| InferenceRequest::ChatCompletion {
        request,
        response_tx: tx,
    })
    .await;

    match result {
        Some(Ok(response)) => res.render(Json(response)),
        Some(Err(e)) => {
            tracing::error!("Chat completion failed: {}", e);
            render_detail(res, StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e));
        }
        None => {
            render_detail(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                "inference thread unavailable",
            );
        }
    }
    Ok(())
}
