//! fngrid-sync — the dispatcher side of the cross-process status protocol.
//!
//! # Architecture
//!
//! ```text
//! dispatcher request ──► Notifier::notify ──► GET /{function}   (autoscaler)
//!                          detached task, bounded retries, dropped on failure
//!
//! InstanceSync::run ──every sync_interval──► GET /status         (autoscaler)
//!                          instances copied into FunctionTable (known names only)
//! ```
//!
//! Both directions go through a small hyper HTTP/1 client ([`http_get`]).
//! Neither failure mode is fatal: the dispatcher keeps serving with its last
//! known instance counts.

pub mod client;
pub mod notifier;
pub mod poller;

pub use client::{SyncError, fetch_autoscaler_status, http_get};
pub use notifier::Notifier;
pub use poller::InstanceSync;
