//! fngrid.toml configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working setup. The binary layers CLI flags and `FNGRID_*` environment
//! variables on top of whatever the file provides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FngridConfig {
    pub dispatcher_port: u16,
    pub autoscaler_port: u16,
    /// Host the dispatcher uses to reach the autoscaler.
    pub autoscaler_host: String,

    /// Period of the scaling decision cycle.
    pub monitor_interval_ms: u64,
    /// Trailing window the decision engine derives call rates from.
    pub metrics_window_secs: u64,
    /// Trailing window for the `calls` field of the autoscaler status.
    pub status_calls_window_secs: u64,
    /// Requests per second a single instance is assumed to absorb.
    pub per_instance_capacity: f64,
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    pub min_instances_per_function: u32,
    pub max_instances_per_function: u32,

    pub function_timeout_ms: u64,
    pub cold_start_idle_threshold_ms: u64,
    pub cold_start_base_delay_ms: u64,

    pub notify_max_retries: u32,
    pub notify_backoff_ms: u64,
    pub notify_timeout_ms: u64,
    /// How often the dispatcher pulls instance counts from the autoscaler.
    pub sync_interval_ms: u64,
    /// How often the dispatcher logs its status report.
    pub report_interval_ms: u64,
}

impl Default for FngridConfig {
    fn default() -> Self {
        Self {
            dispatcher_port: 3000,
            autoscaler_port: 3001,
            autoscaler_host: "127.0.0.1".to_string(),
            monitor_interval_ms: 2000,
            metrics_window_secs: 10,
            status_calls_window_secs: 60,
            per_instance_capacity: 5.0,
            scale_up_threshold: 2.0,
            scale_down_threshold: 0.5,
            min_instances_per_function: 1,
            max_instances_per_function: 10,
            function_timeout_ms: 5000,
            cold_start_idle_threshold_ms: 30_000,
            cold_start_base_delay_ms: 100,
            notify_max_retries: 3,
            notify_backoff_ms: 100,
            notify_timeout_ms: 500,
            sync_interval_ms: 5000,
            report_interval_ms: 60_000,
        }
    }
}

impl FngridConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FngridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the scaling engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_instances_per_function > self.max_instances_per_function {
            return Err(ConfigError::Invalid(format!(
                "min_instances_per_function ({}) exceeds max_instances_per_function ({})",
                self.min_instances_per_function, self.max_instances_per_function
            )));
        }
        if self.per_instance_capacity <= 0.0 {
            return Err(ConfigError::Invalid(
                "per_instance_capacity must be positive".to_string(),
            ));
        }
        if self.metrics_window_secs == 0 || self.status_calls_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "metrics windows must be at least one second".to_string(),
            ));
        }
        if self.scale_down_threshold > self.scale_up_threshold {
            return Err(ConfigError::Invalid(format!(
                "scale_down_threshold ({}) exceeds scale_up_threshold ({})",
                self.scale_down_threshold, self.scale_up_threshold
            )));
        }
        if self.monitor_interval_ms == 0 || self.sync_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timer intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn function_timeout(&self) -> Duration {
        Duration::from_millis(self.function_timeout_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    /// `host:port` of the autoscaler's HTTP surface.
    pub fn autoscaler_address(&self) -> String {
        format!("{}:{}", self.autoscaler_host, self.autoscaler_port)
    }
}
