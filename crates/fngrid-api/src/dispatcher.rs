//! Dispatcher handlers.
//!
//! Function calls are routed through the [`Invoker`]; every call for a known
//! function is also reported to the autoscaler via the [`Notifier`] without
//! waiting for it.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::debug;

use fngrid_core::ErrorBody;
use fngrid_lifecycle::{Invocation, InvokeError, Invoker};
use fngrid_sync::Notifier;

/// Shared state for dispatcher handlers.
#[derive(Clone)]
pub struct DispatcherState {
    pub invoker: Invoker,
    pub notifier: Notifier,
}

fn error_response(status: StatusCode, error: &str, message: String) -> Response {
    (status, Json(ErrorBody::new(error, message))).into_response()
}

fn not_found(function: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "Not Found",
        format!("function {function} does not exist"),
    )
}

/// GET / and GET /index.html
pub async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

/// GET /status
pub async fn status(State(state): State<DispatcherState>) -> impl IntoResponse {
    Json(state.invoker.table().status().await)
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<DispatcherState>) -> impl IntoResponse {
    let snapshot = state.invoker.table().status().await;
    let body = fngrid_metrics::render_prometheus(&snapshot);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /{function}
pub async fn invoke_function(
    State(state): State<DispatcherState>,
    Path(function): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if state.invoker.registry().get(&function).await.is_none() {
        debug!(%function, "unknown function");
        return not_found(&function);
    }

    state.notifier.notify(&function);

    match state.invoker.invoke(&function, query).await {
        Ok(Invocation::Completed { value, .. }) => (StatusCode::OK, Json(value)).into_response(),
        Ok(Invocation::TimedOut { .. }) => error_response(
            StatusCode::GATEWAY_TIMEOUT,
            "Timeout",
            format!("function {function} timed out"),
        ),
        Err(InvokeError::NotFound(_)) => not_found(&function),
    }
}

/// GET /{function}/{*rest}
pub async fn invoke_nested(
    state: State<DispatcherState>,
    Path((function, _rest)): Path<(String, String)>,
    query: Query<HashMap<String, String>>,
) -> Response {
    invoke_function(state, Path(function), query).await
}
