//! fngrid-api — HTTP surface of both fngrid processes.
//!
//! # Dispatcher routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` , `/index.html` | Discovery page polling `/status` |
//! | GET | `/status` | Per-function instances, in-flight requests, cold starts, stats |
//! | GET | `/metrics` | Prometheus exposition of the same snapshot |
//! | GET | `/{function}?query` | Invoke a function |
//! | GET | `/{function}/...` | Same; trailing segments are ignored |
//!
//! # Autoscaler routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/status` | Instances, host metrics, trailing call counts |
//! | GET | `/{function}` | Record one call (auto-registers unknown names) |
//! | GET | `/{function}/...` | Same; trailing segments are ignored |

pub mod autoscaler;
pub mod dispatcher;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;

use fngrid_autoscale::Autoscaler;

pub use dispatcher::DispatcherState;

/// Build the dispatcher router.
pub fn dispatcher_router(state: DispatcherState) -> Router {
    Router::new()
        .route("/", get(dispatcher::index))
        .route("/index.html", get(dispatcher::index))
        .route("/status", get(dispatcher::status))
        .route("/metrics", get(dispatcher::prometheus_metrics))
        .route("/{function}", get(dispatcher::invoke_function))
        .route("/{function}/{*rest}", get(dispatcher::invoke_nested))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Build the autoscaler router.
pub fn autoscaler_router(autoscaler: Autoscaler) -> Router {
    Router::new()
        .route("/status", get(autoscaler::status))
        .route("/{function}", get(autoscaler::record_call))
        .route("/{function}/{*rest}", get(autoscaler::record_nested))
        .with_state(autoscaler)
}
