//! Autoscaler — call-rate driven instance scaling.
//!
//! Each cycle prunes the call window, derives every function's call rate
//! over the scaling window, and moves its instance count one step toward
//! the policy's target. A function whose evaluation fails is logged and
//! skipped; the others are still evaluated.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use fngrid_core::{AutoscalerStatus, FngridConfig, epoch_millis};
use fngrid_metrics::{CallWindow, system};

use crate::instances::InstanceTable;

/// Thresholds and bounds the decision engine applies to every function.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingPolicy {
    /// Requests per second one instance is assumed to absorb.
    pub per_instance_capacity: f64,
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    pub min_instances: u32,
    pub max_instances: u32,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self::from_config(&FngridConfig::default())
    }
}

impl ScalingPolicy {
    pub fn from_config(config: &FngridConfig) -> Self {
        Self {
            per_instance_capacity: config.per_instance_capacity,
            scale_up_threshold: config.scale_up_threshold,
            scale_down_threshold: config.scale_down_threshold,
            min_instances: config.min_instances_per_function,
            max_instances: config.max_instances_per_function,
        }
    }

    /// `ceil(rate / capacity)`, before clamping.
    pub fn ideal_instances(&self, call_rate: f64) -> u32 {
        (call_rate / self.per_instance_capacity).ceil() as u32
    }

    /// Ideal instance count clamped to `[min, max]`.
    pub fn target_instances(&self, call_rate: f64) -> u32 {
        self.ideal_instances(call_rate)
            .max(self.min_instances)
            .min(self.max_instances)
    }
}

/// Outcome of one function's evaluation in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    ScaleUp { from: u32, to: u32 },
    ScaleDown { from: u32, to: u32 },
    NoChange,
}

impl ScaleDecision {
    /// Instance count after applying the decision to `current`.
    pub fn apply(self, current: u32) -> u32 {
        match self {
            ScaleDecision::ScaleUp { to, .. } | ScaleDecision::ScaleDown { to, .. } => to,
            ScaleDecision::NoChange => current,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScaleError {
    #[error("call rate {0} is not a finite non-negative number")]
    InvalidRate(f64),

    #[error("per-instance capacity {0} must be positive")]
    InvalidCapacity(f64),
}

/// Decide the next instance count for one function.
///
/// Moves by at most one instance and never leaves `[min, max]` from inside it.
pub fn evaluate(
    policy: &ScalingPolicy,
    call_rate: f64,
    current: u32,
) -> Result<ScaleDecision, ScaleError> {
    if !call_rate.is_finite() || call_rate < 0.0 {
        return Err(ScaleError::InvalidRate(call_rate));
    }
    if policy.per_instance_capacity <= 0.0 || !policy.per_instance_capacity.is_finite() {
        return Err(ScaleError::InvalidCapacity(policy.per_instance_capacity));
    }

    let target = policy.target_instances(call_rate);
    let max = policy.max_instances;
    let min = policy.min_instances;

    if target > current || (call_rate > policy.scale_up_threshold && current < max) {
        let next = current.saturating_add(1).min(max);
        if next > current {
            return Ok(ScaleDecision::ScaleUp {
                from: current,
                to: next,
            });
        }
    } else if target < current && call_rate < policy.scale_down_threshold && current > min {
        let next = (current - 1).max(min);
        if next < current {
            return Ok(ScaleDecision::ScaleDown {
                from: current,
                to: next,
            });
        }
    }

    Ok(ScaleDecision::NoChange)
}

/// The autoscaler process's state: call window, instance table, and policy.
///
/// Cheap to clone; clones share the same tables, so the HTTP handlers and the
/// scaling loop see each other's writes.
#[derive(Clone)]
pub struct Autoscaler {
    window: CallWindow,
    instances: InstanceTable,
    policy: ScalingPolicy,
    /// Trailing window for rate computation.
    metrics_window_secs: u64,
    /// Trailing window for the `calls` field of the status snapshot.
    status_window_secs: u64,
}

impl Autoscaler {
    pub fn new(policy: ScalingPolicy, metrics_window_secs: u64, status_window_secs: u64) -> Self {
        let retention = metrics_window_secs.max(status_window_secs);
        Self {
            window: CallWindow::new(retention),
            instances: InstanceTable::new(),
            policy,
            metrics_window_secs,
            status_window_secs,
        }
    }

    pub fn from_config(config: &FngridConfig) -> Self {
        Self::new(
            ScalingPolicy::from_config(config),
            config.metrics_window_secs,
            config.status_calls_window_secs,
        )
    }

    pub fn policy(&self) -> &ScalingPolicy {
        &self.policy
    }

    pub fn window(&self) -> &CallWindow {
        &self.window
    }

    pub fn instances(&self) -> &InstanceTable {
        &self.instances
    }

    /// Register a function with `min_instances`. Returns `true` if new.
    pub async fn register(&self, function: &str) -> bool {
        self.window.register(function).await;
        let added = self
            .instances
            .ensure(function, self.policy.min_instances)
            .await;
        if added {
            info!(%function, instances = self.policy.min_instances, "function registered");
        }
        added
    }

    /// Record one call. Unknown functions are registered rather than rejected.
    pub async fn record_call(&self, function: &str, timestamp_ms: u64) {
        if self
            .instances
            .ensure(function, self.policy.min_instances)
            .await
        {
            info!(%function, "call for unknown function, registering");
        }
        let retained = self.window.record_call(function, timestamp_ms).await;
        debug!(%function, retained, "call recorded");
    }

    /// Run one scaling cycle at `now_ms`.
    pub async fn run_cycle(&self, now_ms: u64) -> Vec<(String, ScaleDecision)> {
        self.window.prune(now_ms).await;

        // Functions seen only through the window still get an instance entry.
        for function in self.window.functions().await {
            self.instances
                .ensure(&function, self.policy.min_instances)
                .await;
        }

        let mut decisions = Vec::new();
        for function in self.instances.functions().await {
            let call_rate = self
                .window
                .rate(&function, now_ms, self.metrics_window_secs)
                .await;
            let current = self
                .instances
                .get(&function)
                .await
                .unwrap_or(self.policy.min_instances);

            let decision = match evaluate(&self.policy, call_rate, current) {
                Ok(d) => d,
                Err(e) => {
                    warn!(%function, error = %e, "scaling evaluation failed");
                    continue;
                }
            };

            match decision {
                ScaleDecision::ScaleUp { from, to } => {
                    self.instances.set(&function, to).await;
                    info!(
                        %function,
                        from,
                        to,
                        call_rate,
                        ideal = self.policy.ideal_instances(call_rate),
                        "scaling up"
                    );
                }
                ScaleDecision::ScaleDown { from, to } => {
                    self.instances.set(&function, to).await;
                    info!(
                        %function,
                        from,
                        to,
                        call_rate,
                        ideal = self.policy.ideal_instances(call_rate),
                        "scaling down"
                    );
                }
                ScaleDecision::NoChange => {}
            }

            decisions.push((function, decision));
        }

        self.log_report(now_ms).await;
        decisions
    }

    /// Snapshot for `GET /status`.
    pub async fn status(&self, now_ms: u64) -> AutoscalerStatus {
        let status_window_ms = self.status_window_secs.saturating_mul(1000);
        let calls: BTreeMap<String, u64> = self
            .window
            .counts_within(now_ms, status_window_ms)
            .await
            .into_iter()
            .collect();

        let mut call_rates = BTreeMap::new();
        for function in self.window.functions().await {
            let rate = self
                .window
                .rate(&function, now_ms, self.metrics_window_secs)
                .await;
            call_rates.insert(function, rate);
        }

        AutoscalerStatus {
            timestamp: now_ms,
            instances: self.instances.snapshot().await,
            metrics: system::collect(),
            calls,
            call_rates,
        }
    }

    async fn log_report(&self, now_ms: u64) {
        let status_window_ms = self.status_window_secs.saturating_mul(1000);
        let calls = self.window.counts_within(now_ms, status_window_ms).await;
        for (function, instances) in self.instances.snapshot().await {
            debug!(
                %function,
                instances,
                recent_calls = calls.get(&function).copied().unwrap_or(0),
                "autoscaler status"
            );
        }
    }

    /// Run scaling cycles every `interval` until shutdown.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            interval_ms = interval.as_millis() as u64,
            window_secs = self.metrics_window_secs,
            "autoscaler started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.run_cycle(epoch_millis()).await;
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}
