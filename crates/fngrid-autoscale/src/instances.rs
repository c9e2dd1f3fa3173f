//! Instance table — the autoscaler's authoritative instance counts.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

/// Per-function instance counts, shared between the scaling loop (writer)
/// and the status endpoint (reader).
#[derive(Clone, Default)]
pub struct InstanceTable {
    counts: Arc<RwLock<HashMap<String, u32>>>,
}

impl InstanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `function` with `initial` instances unless it already exists.
    ///
    /// Returns `true` if the function was newly added.
    pub async fn ensure(&self, function: &str, initial: u32) -> bool {
        let mut counts = self.counts.write().await;
        if counts.contains_key(function) {
            return false;
        }
        counts.insert(function.to_string(), initial);
        true
    }

    pub async fn get(&self, function: &str) -> Option<u32> {
        self.counts.read().await.get(function).copied()
    }

    pub async fn set(&self, function: &str, instances: u32) {
        self.counts
            .write()
            .await
            .insert(function.to_string(), instances);
    }

    /// Sorted copy of all counts.
    pub async fn snapshot(&self) -> BTreeMap<String, u32> {
        self.counts
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub async fn functions(&self) -> Vec<String> {
        self.snapshot().await.into_keys().collect()
    }
}
