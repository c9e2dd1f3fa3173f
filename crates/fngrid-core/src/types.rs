//! Wire types for the dispatcher and autoscaler status endpoints.
//!
//! Field names are camelCase on the wire so existing dashboards and report
//! scripts can read the snapshots unchanged.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Unique name of a function (also its URL path segment).
pub type FunctionName = String;

// ── Dispatcher ─────────────────────────────────────────────────────

/// Aggregated per-call statistics as reported by `GET /status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Subset of `failed_requests` that ended in a timeout.
    pub timeout_requests: u64,
    /// Milliseconds, summed over successful calls.
    pub total_response_time: f64,
    pub avg_response_time: f64,
    /// `None` until the first successful call.
    pub min_response_time: Option<f64>,
    pub max_response_time: f64,
}

/// One function's entry in the dispatcher snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    pub instances: u32,
    pub active_requests: u64,
    pub cold_starts: u64,
    /// Unix milliseconds of the last completed warm-up.
    pub last_accessed: u64,
    pub stats: StatsView,
}

/// Body of the dispatcher's `GET /status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherStatus {
    /// Process uptime in seconds.
    pub uptime: f64,
    pub functions: BTreeMap<FunctionName, FunctionStatus>,
}

// ── Autoscaler ─────────────────────────────────────────────────────

/// Host load figures attached to the autoscaler snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    /// Percent, 0–100.
    pub cpu_usage: f64,
    /// Percent, 0–100.
    pub memory_usage: f64,
    /// One-minute load average.
    pub load_avg: f64,
}

/// Body of the autoscaler's `GET /status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerStatus {
    /// Unix milliseconds at which the snapshot was produced.
    pub timestamp: u64,
    pub instances: BTreeMap<FunctionName, u32>,
    pub metrics: SystemMetrics,
    /// Calls observed over the trailing status window (60s by default).
    pub calls: BTreeMap<FunctionName, u64>,
    /// Calls per second over the scaling window.
    #[serde(default)]
    pub call_rates: BTreeMap<FunctionName, f64>,
}

/// Acknowledgement returned by the autoscaler's notify endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifyAck {
    pub success: bool,
    pub message: String,
}

impl NotifyAck {
    pub fn recorded() -> Self {
        Self {
            success: true,
            message: "call recorded".to_string(),
        }
    }
}

/// JSON error body (`{"error": ..., "message": ...}`).
///
/// Handlers use the same shape for their own failures, which is what marks a
/// call as failed in the statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_status_uses_camel_case() {
        let mut status = DispatcherStatus {
            uptime: 1.5,
            functions: BTreeMap::new(),
        };
        status.functions.insert(
            "echo".to_string(),
            FunctionStatus {
                instances: 2,
                active_requests: 1,
                ..Default::default()
            },
        );

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["functions"]["echo"]["activeRequests"], 1);
        assert_eq!(json["functions"]["echo"]["stats"]["totalRequests"], 0);
        assert!(json["functions"]["echo"]["stats"]["minResponseTime"].is_null());
    }

    #[test]
    fn autoscaler_status_tolerates_missing_rates() {
        let body = r#"{
            "timestamp": 1,
            "instances": {"echo": 3},
            "metrics": {"cpuUsage": 1.0, "memoryUsage": 2.0, "loadAvg": 0.5},
            "calls": {"echo": 12}
        }"#;
        let status: AutoscalerStatus = serde_json::from_str(body).unwrap();
        assert_eq!(status.instances["echo"], 3);
        assert!(status.call_rates.is_empty());
    }

    #[test]
    fn epoch_millis_is_monotone_enough() {
        let a = epoch_millis();
        let b = epoch_millis();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000);
    }
}
