//! Call execution for the dispatcher.
//!
//! [`Invoker::invoke`] runs one call end to end: cold-start classification,
//! the synthetic delay, the handler in its own task, the timeout race, and
//! the single outcome record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use fngrid_core::{FngridConfig, epoch_millis};
use fngrid_functions::{FunctionHandler, FunctionRegistry, FunctionRequest, Query, is_error_result};

use crate::coldstart::ColdStartPolicy;
use crate::stats::CallOutcome;
use crate::table::{CallTicket, FunctionTable};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvokeError {
    #[error("function {0} does not exist")]
    NotFound(String),
}

/// How a call ended, as seen by the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The handler answered in time. `value` carries an `error` field when
    /// the call counted as failed.
    Completed {
        value: Value,
        cold_start_delay: Duration,
        response_time: Duration,
    },
    /// The handler did not answer within the function timeout.
    TimedOut { timeout: Duration },
}

impl Invocation {
    pub fn is_failure(&self) -> bool {
        match self {
            Invocation::Completed { value, .. } => is_error_result(value),
            Invocation::TimedOut { .. } => true,
        }
    }
}

/// Executes calls against a [`FunctionRegistry`], recording into a
/// [`FunctionTable`].
#[derive(Clone)]
pub struct Invoker {
    table: FunctionTable,
    registry: FunctionRegistry,
    cold_start: ColdStartPolicy,
    timeout: Duration,
}

impl Invoker {
    pub fn new(
        table: FunctionTable,
        registry: FunctionRegistry,
        cold_start: ColdStartPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            table,
            registry,
            cold_start,
            timeout,
        }
    }

    pub fn from_config(table: FunctionTable, registry: FunctionRegistry, config: &FngridConfig) -> Self {
        Self::new(
            table,
            registry,
            ColdStartPolicy::from_config(config),
            config.function_timeout(),
        )
    }

    pub fn table(&self) -> &FunctionTable {
        &self.table
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Create table entries for every registered handler.
    pub async fn sync_registry(&self) -> usize {
        let now = epoch_millis();
        let names = self.registry.names().await;
        for name in &names {
            self.table.register(name, now).await;
        }
        names.len()
    }

    /// Run one call of `name` with `query`.
    pub async fn invoke(&self, name: &str, query: Query) -> Result<Invocation, InvokeError> {
        let handler = self
            .registry
            .get(name)
            .await
            .ok_or_else(|| InvokeError::NotFound(name.to_string()))?;

        let started = Instant::now();
        let call = self.table.begin_call(name, &self.cold_start, epoch_millis()).await;
        let _active = call.guard;

        let cold_start_delay = call.temperature.delay();
        if !cold_start_delay.is_zero() {
            tokio::time::sleep(cold_start_delay).await;
        }
        call.entry.touch(call.arrived_ms);

        let ticket = Arc::new(CallTicket::new(call.entry.clone()));
        let mut rx = spawn_handler(
            handler,
            FunctionRequest {
                function: name.to_string(),
                query,
            },
            ticket.clone(),
            started,
            cold_start_delay,
        );

        match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(completed)) => Ok(completed.into_invocation(cold_start_delay)),
            Ok(Err(_)) => {
                // Sender dropped without sending: the task died before recording.
                ticket.complete(CallOutcome::Failure);
                Ok(Invocation::Completed {
                    value: execution_error("handler task aborted"),
                    cold_start_delay,
                    response_time: started.elapsed().saturating_sub(cold_start_delay),
                })
            }
            Err(_) => {
                if ticket.complete(CallOutcome::Timeout) {
                    warn!(function = %name, timeout_ms = self.timeout.as_millis() as u64, "function timed out");
                    return Ok(Invocation::TimedOut {
                        timeout: self.timeout,
                    });
                }
                // The handler recorded its outcome between the deadline and
                // our attempt; its result is already on the way.
                match rx.await {
                    Ok(completed) => Ok(completed.into_invocation(cold_start_delay)),
                    Err(_) => Ok(Invocation::TimedOut {
                        timeout: self.timeout,
                    }),
                }
            }
        }
    }
}

struct Completed {
    value: Value,
    response_time: Duration,
}

impl Completed {
    fn into_invocation(self, cold_start_delay: Duration) -> Invocation {
        Invocation::Completed {
            value: self.value,
            cold_start_delay,
            response_time: self.response_time,
        }
    }
}

fn execution_error(message: impl Into<String>) -> Value {
    json!({
        "error": "Function execution error",
        "message": message.into(),
    })
}

/// Run the handler detached. The task records the outcome through `ticket`
/// and only reports back if it won the record.
fn spawn_handler(
    handler: FunctionHandler,
    request: FunctionRequest,
    ticket: Arc<CallTicket>,
    started: Instant,
    cold_start_delay: Duration,
) -> oneshot::Receiver<Completed> {
    let (tx, rx) = oneshot::channel();
    let function = request.function.clone();

    tokio::spawn(async move {
        let value = match tokio::spawn(handler(request)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(function = %function, error = %e, "function execution failed");
                execution_error(e.to_string())
            }
            Err(e) => {
                warn!(function = %function, error = %e, "function panicked");
                execution_error("function panicked")
            }
        };
        let response_time = started.elapsed().saturating_sub(cold_start_delay);

        let outcome = if is_error_result(&value) {
            CallOutcome::Failure
        } else {
            CallOutcome::Success {
                response_time_ms: response_time.as_secs_f64() * 1000.0,
            }
        };

        if ticket.complete(outcome) {
            debug!(
                function = %function,
                response_time_ms = response_time.as_secs_f64() * 1000.0,
                failed = is_error_result(&value),
                "function completed"
            );
            let _ = tx.send(Completed {
                value,
                response_time,
            });
        } else {
            debug!(function = %function, "late resolution ignored");
        }
    });

    rx
}
