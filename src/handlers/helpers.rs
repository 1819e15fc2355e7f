use salvo::prelude::*;
use tokio::sync::{mpsc, oneshot};

use crate::inference::InferenceRequest;
use crate::state::AppState;

pub(crate) fn get_state(depot: &mut Depot) -> Result<&AppState, StatusError> {
    depot
        .obtain::<AppState>()
        .map_err(|_| StatusError::internal_server_error())
}

/// Send a request to the inference thread and wait for its answer, however
/// long generation takes; no deadline or cancellation propagates into the
/// generation call. Returns None only if the thread is gone.
pub(crate) async fn send_and_wait<R>(
    tx: &mpsc::Sender<InferenceRequest>,
    make_request: impl FnOnce(oneshot::Sender<R>) -> InferenceRequest,
) -> Option<R> {
    let (response_tx, response_rx) = oneshot::channel();
    tx.send(make_request(response_tx)).await.ok()?;
    response_rx.await.ok()
}
