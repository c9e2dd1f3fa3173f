//! fngrid-core — shared configuration and wire types.
//!
//! Both the dispatcher and the autoscaler speak the JSON shapes defined in
//! [`types`]; [`config`] holds the tunables shared by the two processes.

pub mod config;
pub mod types;

pub use config::{ConfigError, FngridConfig};
pub use types::*;
