//! Fire-and-forget call notifications to the autoscaler.

use std::time::Duration;

use http::StatusCode;
use tokio::task::JoinHandle;
use tracing::debug;

use fngrid_core::FngridConfig;

use crate::client::http_get;

/// Sends `GET /{function}` to the autoscaler for every dispatched call.
///
/// Each notification is one attempt plus up to `max_retries` retries with a
/// fixed backoff. Exhausting the retries drops the notification.
#[derive(Debug, Clone)]
pub struct Notifier {
    address: String,
    max_retries: u32,
    backoff: Duration,
    attempt_timeout: Duration,
}

impl Notifier {
    pub fn new(
        address: impl Into<String>,
        max_retries: u32,
        backoff: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            max_retries,
            backoff,
            attempt_timeout,
        }
    }

    pub fn from_config(config: &FngridConfig) -> Self {
        Self::new(
            config.autoscaler_address(),
            config.notify_max_retries,
            Duration::from_millis(config.notify_backoff_ms),
            Duration::from_millis(config.notify_timeout_ms),
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Deliver in a detached task. The handle is only useful to tests.
    pub fn notify(&self, function: &str) -> JoinHandle<bool> {
        let notifier = self.clone();
        let function = function.to_string();
        tokio::spawn(async move { notifier.deliver(&function).await })
    }

    /// Try to deliver one notification. Returns whether the autoscaler
    /// acknowledged it.
    pub async fn deliver(&self, function: &str) -> bool {
        let path = format!("/{function}");
        for attempt in 0..=self.max_retries {
            match http_get(&self.address, &path, self.attempt_timeout).await {
                Ok((status, _)) if status == StatusCode::OK => {
                    if attempt > 0 {
                        debug!(%function, attempt, "notification delivered after retry");
                    }
                    return true;
                }
                Ok((status, _)) => {
                    debug!(%function, attempt, %status, "notification rejected");
                }
                Err(e) => {
                    debug!(%function, attempt, error = %e, "notification failed");
                }
            }
            if attempt < self.max_retries {
                tokio::time::sleep(self.backoff).await;
            }
        }
        debug!(
            %function,
            attempts = self.max_retries + 1,
            address = %self.address,
            "notification dropped"
        );
        false
    }
}
