//! fngrid-lifecycle — simulated function instance lifecycle.
//!
//! # Architecture
//!
//! ```text
//! Invoker::invoke(name, query)
//!   ├── FunctionTable lookup (lazy entry for newly registered handlers)
//!   ├── ActiveGuard          activeRequests += 1, released on drop
//!   ├── ColdStartPolicy      Cold → synthetic delay, Warm → none
//!   ├── handler task         runs detached, reports over a oneshot
//!   ├── timeout              504 path, records Timeout
//!   └── CallTicket           records exactly one outcome per call
//! ```
//!
//! Late handler resolutions after a timeout go through the same
//! [`CallTicket`] and are dropped.

pub mod coldstart;
pub mod invoke;
pub mod stats;
pub mod table;

pub use coldstart::{ColdStartPolicy, Temperature};
pub use invoke::{Invocation, InvokeError, Invoker};
pub use stats::{CallOutcome, RuntimeStats};
pub use table::{ActiveGuard, BegunCall, CallTicket, FunctionEntry, FunctionTable};
