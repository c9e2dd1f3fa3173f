//! Instance sync: the dispatcher's periodic read of autoscaler state.
//!
//! The dispatcher's instance counts are a cache of the autoscaler's. A failed
//! poll leaves the last known counts in place.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use fngrid_core::FngridConfig;
use fngrid_lifecycle::FunctionTable;

use crate::client::{SyncError, fetch_autoscaler_status};

/// Background poller copying instance counts into a [`FunctionTable`].
#[derive(Clone)]
pub struct InstanceSync {
    address: String,
    table: FunctionTable,
    interval: Duration,
    timeout: Duration,
}

impl InstanceSync {
    pub fn new(
        address: impl Into<String>,
        table: FunctionTable,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            table,
            interval,
            timeout,
        }
    }

    pub fn from_config(table: FunctionTable, config: &FngridConfig) -> Self {
        Self::new(
            config.autoscaler_address(),
            table,
            config.sync_interval(),
            Duration::from_millis(config.notify_timeout_ms.max(1_000)),
        )
    }

    /// Poll once. Returns how many local counts changed.
    pub async fn sync_once(&self) -> Result<usize, SyncError> {
        let status = fetch_autoscaler_status(&self.address, self.timeout).await?;
        let changed = self.table.apply_instances(&status.instances).await;
        if changed > 0 {
            info!(changed, "instance counts synced from autoscaler");
        } else {
            debug!("instance counts unchanged");
        }
        Ok(changed)
    }

    /// Poll every `interval` until `shutdown` fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            address = %self.address,
            interval_ms = self.interval.as_millis() as u64,
            "instance sync started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.sync_once().await {
                        warn!(error = %e, "instance sync failed, keeping last known counts");
                    }
                }
                _ = shutdown.changed() => {
                    info!("instance sync shutting down");
                    break;
                }
            }
        }
    }
}
