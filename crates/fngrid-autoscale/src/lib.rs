//! fngrid-autoscale — call-rate driven instance scaling.
//!
//! Reads per-function call rates from a [`CallWindow`](fngrid_metrics::CallWindow),
//! compares them against a [`ScalingPolicy`], and moves each function's
//! instance count by at most one per cycle.
//!
//! # Scaling Algorithm
//!
//! ```text
//! rate   = calls in trailing window / window_secs
//! ideal  = ceil(rate / per_instance_capacity)
//! target = clamp(ideal, min, max)
//!
//! if target > current or (rate > scale_up_threshold and current < max):
//!     current += 1
//! else if target < current and rate < scale_down_threshold and current > min:
//!     current -= 1
//! ```
//!
//! The up and down thresholds are independent (down stricter than up), and
//! the single-step move bounds oscillation to one instance per cycle.

pub mod instances;
pub mod scaler;

pub use instances::InstanceTable;
pub use scaler::{Autoscaler, ScaleDecision, ScaleError, ScalingPolicy, evaluate};
