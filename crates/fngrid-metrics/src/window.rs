//! Call window — per-function call timestamps over a sliding window.
//!
//! Timestamps are Unix milliseconds. Reads filter by the requested window
//! without mutating; `prune()` drops everything older than the retention
//! window and is run eagerly at the start of every scaling cycle, so stale
//! entries never survive more than one cycle.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

/// Shared, clonable store of call histories keyed by function name.
#[derive(Clone)]
pub struct CallWindow {
    histories: Arc<RwLock<HashMap<String, VecDeque<u64>>>>,
    /// Longest window any reader asks for; older entries are pruned.
    retention_ms: u64,
}

impl CallWindow {
    /// Create a window that retains calls for `retention_secs`.
    pub fn new(retention_secs: u64) -> Self {
        Self {
            histories: Arc::new(RwLock::new(HashMap::new())),
            retention_ms: retention_secs.saturating_mul(1000),
        }
    }

    pub fn retention_ms(&self) -> u64 {
        self.retention_ms
    }

    /// Register a function with an empty history. Returns `true` if it was new.
    pub async fn register(&self, function: &str) -> bool {
        let mut histories = self.histories.write().await;
        if histories.contains_key(function) {
            return false;
        }
        histories.insert(function.to_string(), VecDeque::new());
        debug!(%function, "call history registered");
        true
    }

    /// Append a call. Unknown functions are registered on the fly.
    ///
    /// Returns the number of entries now held for the function.
    pub async fn record_call(&self, function: &str, timestamp_ms: u64) -> usize {
        let mut histories = self.histories.write().await;
        let history = histories.entry(function.to_string()).or_default();
        history.push_back(timestamp_ms);
        history.len()
    }

    /// Calls per second for `function` over the trailing `window_secs`.
    ///
    /// An entry at exactly `now - window` is inside the window. Unknown
    /// functions and a zero window both report 0.
    pub async fn rate(&self, function: &str, now_ms: u64, window_secs: u64) -> f64 {
        if window_secs == 0 {
            return 0.0;
        }
        let count = self
            .count_within(function, now_ms, window_secs.saturating_mul(1000))
            .await;
        count as f64 / window_secs as f64
    }

    /// Number of calls with `now - t <= window_ms`.
    pub async fn count_within(&self, function: &str, now_ms: u64, window_ms: u64) -> u64 {
        let histories = self.histories.read().await;
        histories
            .get(function)
            .map(|h| count_in(h, now_ms, window_ms))
            .unwrap_or(0)
    }

    /// Trailing counts for every known function.
    pub async fn counts_within(&self, now_ms: u64, window_ms: u64) -> HashMap<String, u64> {
        let histories = self.histories.read().await;
        histories
            .iter()
            .map(|(name, h)| (name.clone(), count_in(h, now_ms, window_ms)))
            .collect()
    }

    /// Drop every entry older than the retention window.
    ///
    /// Returns how many timestamps were removed across all functions.
    pub async fn prune(&self, now_ms: u64) -> usize {
        let mut histories = self.histories.write().await;
        let mut removed = 0;
        for history in histories.values_mut() {
            let before = history.len();
            history.retain(|&t| now_ms.saturating_sub(t) <= self.retention_ms);
            removed += before - history.len();
        }
        if removed > 0 {
            debug!(removed, "pruned stale call history");
        }
        removed
    }

    /// All known function names, sorted.
    pub async fn functions(&self) -> Vec<String> {
        let histories = self.histories.read().await;
        let mut names: Vec<String> = histories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Raw number of retained entries (for tests and diagnostics).
    pub async fn len(&self, function: &str) -> usize {
        let histories = self.histories.read().await;
        histories.get(function).map(VecDeque::len).unwrap_or(0)
    }
}

fn count_in(history: &VecDeque<u64>, now_ms: u64, window_ms: u64) -> u64 {
    history
        .iter()
        .filter(|&&t| now_ms.saturating_sub(t) <= window_ms)
        .count() as u64
}
