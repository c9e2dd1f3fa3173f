//! fngrid-functions — named function handlers.
//!
//! A function is a stateless async handler from decoded query parameters to
//! a JSON value. The dispatcher looks handlers up by name in a
//! [`FunctionRegistry`]; a result carrying an `error` field counts as a
//! failed call.
//!
//! Built-ins: `echo`, `calculate`, `weather`.

pub mod builtin;
pub mod registry;

pub use registry::{
    FunctionHandler, FunctionRequest, FunctionRegistry, HandlerFuture, Query, RegistryError,
    is_error_result,
};
