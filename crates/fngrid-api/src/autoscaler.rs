//! Autoscaler handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use fngrid_autoscale::Autoscaler;
use fngrid_core::{NotifyAck, epoch_millis};

/// GET /status
pub async fn status(State(autoscaler): State<Autoscaler>) -> impl IntoResponse {
    Json(autoscaler.status(epoch_millis()).await)
}

/// GET /{function}
///
/// Always acknowledges; unknown names are registered on the fly.
pub async fn record_call(
    State(autoscaler): State<Autoscaler>,
    Path(function): Path<String>,
) -> Json<NotifyAck> {
    autoscaler.record_call(&function, epoch_millis()).await;
    Json(NotifyAck::recorded())
}

/// GET /{function}/{*rest}
pub async fn record_nested(
    state: State<Autoscaler>,
    Path((function, _rest)): Path<(String, String)>,
) -> Json<NotifyAck> {
    record_call(state, Path(function)).await
}
