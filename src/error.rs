use salvo::http::StatusCode;
use salvo::prelude::*;

use crate::types::ErrorResponse;

/// Render an error response as `{"detail": message}` with the given status.
///
/// Request-shape violations use 400, everything surfaced from the inference
/// side uses 500; decode and generation failures are not distinguished.
pub fn render_detail(res: &mut Response, status: StatusCode, message: impl Into<String>) {
    res.status_code(status);
    res.render(Json(ErrorResponse {
        detail: message.into(),
    }));
}
