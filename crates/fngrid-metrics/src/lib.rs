//! fngrid-metrics — call-rate and host observability.
//!
//! # Architecture
//!
//! ```text
//! CallWindow
//!   ├── record_call() ← one entry per notified call
//!   ├── rate()        → calls/sec over a trailing window
//!   ├── count_within()→ trailing call count (status endpoint)
//!   └── prune()       ← start of every scaling cycle
//!
//! system::collect()   → SystemMetrics for the autoscaler snapshot
//! render_prometheus() → text/plain for the dispatcher's /metrics
//! ```

pub mod prometheus;
pub mod system;
pub mod window;

pub use prometheus::render_prometheus;
pub use window::CallWindow;
