use salvo::prelude::*;

use super::helpers::get_state;

/// GET /health - Health check
#[handler]
pub async fn health(res: &mut Response) {
    res.render(Json(serde_json::json!({
        "status": "healthy",
        "service": "vlm-api"
    })));
}

/// GET /v1/model-info - Describe the loaded model
///
/// Served from state captured at startup; the model identity never changes
/// after load, so this does not queue behind in-flight generations.
#[handler]
pub async fn model_info(depot: &mut Depot, res: &mut Response) -> Result<(), StatusError> {
    let state = get_state(depot)?;
    res.render(Json(state.model_info.clone()));
    Ok(())
}
