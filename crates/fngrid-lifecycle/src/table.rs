//! Function table: the dispatcher's per-function runtime state.
//!
//! Holds instance counts (as last synced from the autoscaler), in-flight
//! request counters, cold-start bookkeeping, and call statistics. The table
//! is passed explicitly to the request path and to the sync loop.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info};

use fngrid_core::{DispatcherStatus, FunctionStatus};

use crate::coldstart::{ColdStartPolicy, Temperature};
use crate::stats::{CallOutcome, RuntimeStats};

struct EntryState {
    last_accessed_ms: u64,
    cold_starts: u64,
    stats: RuntimeStats,
}

/// Runtime state of one function.
pub struct FunctionEntry {
    name: String,
    instances: AtomicU32,
    active_requests: AtomicU64,
    state: Mutex<EntryState>,
}

impl FunctionEntry {
    fn new(name: &str, instances: u32, now_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            instances: AtomicU32::new(instances),
            active_requests: AtomicU64::new(0),
            state: Mutex::new(EntryState {
                last_accessed_ms: now_ms,
                cold_starts: 0,
                stats: RuntimeStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instances(&self) -> u32 {
        self.instances.load(Ordering::Relaxed)
    }

    pub fn set_instances(&self, instances: u32) {
        self.instances.store(instances, Ordering::Relaxed);
    }

    pub fn active_requests(&self) -> u64 {
        self.active_requests.load(Ordering::Acquire)
    }

    /// Count a request as in flight until the returned guard drops.
    pub fn enter(self: &Arc<Self>) -> ActiveGuard {
        self.active_requests.fetch_add(1, Ordering::AcqRel);
        ActiveGuard {
            entry: Arc::clone(self),
        }
    }

    /// Classify an arriving call. A cold classification bumps the
    /// cold-start counter; `last_accessed` is left for [`touch`](Self::touch).
    pub fn classify(&self, policy: &ColdStartPolicy, now_ms: u64) -> Temperature {
        let mut state = self.lock();
        let temperature = policy.classify(state.last_accessed_ms, now_ms);
        if let Temperature::Cold { delay } = temperature {
            state.cold_starts += 1;
            info!(
                function = %self.name,
                idle_ms = now_ms.saturating_sub(state.last_accessed_ms),
                delay_ms = delay.as_secs_f64() * 1000.0,
                cold_starts = state.cold_starts,
                "cold start"
            );
        }
        temperature
    }

    /// Mark the function accessed at `now_ms`. Never moves backwards.
    pub fn touch(&self, now_ms: u64) {
        let mut state = self.lock();
        state.last_accessed_ms = state.last_accessed_ms.max(now_ms);
    }

    fn record(&self, outcome: CallOutcome) {
        self.lock().stats.record(outcome);
    }

    pub fn stats(&self) -> RuntimeStats {
        self.lock().stats.clone()
    }

    pub fn cold_starts(&self) -> u64 {
        self.lock().cold_starts
    }

    pub fn last_accessed_ms(&self) -> u64 {
        self.lock().last_accessed_ms
    }

    pub fn status(&self) -> FunctionStatus {
        let state = self.lock();
        FunctionStatus {
            instances: self.instances(),
            active_requests: self.active_requests(),
            cold_starts: state.cold_starts,
            last_accessed: state.last_accessed_ms,
            stats: state.stats.view(),
        }
    }
}

/// Scoped in-flight counter. Decrements exactly once, on drop.
pub struct ActiveGuard {
    entry: Arc<FunctionEntry>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.entry.active_requests.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Per-request "outcome recorded" flag.
///
/// Shared between the dispatcher's wait (success, failure or timeout) and
/// the detached handler task; whichever records first wins and every later
/// attempt is a no-op.
pub struct CallTicket {
    entry: Arc<FunctionEntry>,
    recorded: AtomicBool,
}

impl CallTicket {
    pub fn new(entry: Arc<FunctionEntry>) -> Self {
        Self {
            entry,
            recorded: AtomicBool::new(false),
        }
    }

    /// Record `outcome` unless an outcome was already recorded.
    ///
    /// Returns `true` if this call recorded it.
    pub fn complete(&self, outcome: CallOutcome) -> bool {
        if self.recorded.swap(true, Ordering::AcqRel) {
            debug!(function = %self.entry.name, ?outcome, "outcome already recorded, ignoring");
            return false;
        }
        self.entry.record(outcome);
        true
    }

    pub fn is_recorded(&self) -> bool {
        self.recorded.load(Ordering::Acquire)
    }
}

/// A call admitted by [`FunctionTable::begin_call`].
pub struct BegunCall {
    pub entry: Arc<FunctionEntry>,
    pub guard: ActiveGuard,
    pub temperature: Temperature,
    pub arrived_ms: u64,
}

/// All functions known to the dispatcher.
#[derive(Clone)]
pub struct FunctionTable {
    entries: Arc<RwLock<HashMap<String, Arc<FunctionEntry>>>>,
    started: Instant,
    initial_instances: u32,
}

impl FunctionTable {
    /// Create an empty table; new entries start with `initial_instances`.
    pub fn new(initial_instances: u32) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            started: Instant::now(),
            initial_instances,
        }
    }

    /// Get or create the entry for `name`.
    pub async fn register(&self, name: &str, now_ms: u64) -> Arc<FunctionEntry> {
        if let Some(entry) = self.get(name).await {
            return entry;
        }
        let mut entries = self.entries.write().await;
        entries
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(function = %name, "function entry created");
                Arc::new(FunctionEntry::new(name, self.initial_instances, now_ms))
            })
            .clone()
    }

    /// Admit a call to `name` arriving at `now_ms`.
    ///
    /// Marks it in flight and classifies it Warm or Cold. The caller sleeps
    /// out any delay and then calls [`FunctionEntry::touch`] with
    /// `arrived_ms`.
    pub async fn begin_call(&self, name: &str, policy: &ColdStartPolicy, now_ms: u64) -> BegunCall {
        let entry = self.register(name, now_ms).await;
        let guard = entry.enter();
        let temperature = entry.classify(policy, now_ms);
        BegunCall {
            entry,
            guard,
            temperature,
            arrived_ms: now_ms,
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<FunctionEntry>> {
        self.entries.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Overwrite local instance counts for functions this table knows.
    ///
    /// Returns how many entries changed.
    pub async fn apply_instances(&self, instances: &BTreeMap<String, u32>) -> usize {
        let entries = self.entries.read().await;
        let mut changed = 0;
        for (name, &count) in instances {
            if let Some(entry) = entries.get(name)
                && entry.instances() != count
            {
                entry.set_instances(count);
                changed += 1;
            }
        }
        changed
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Snapshot for `GET /status`. Side-effect free.
    pub async fn status(&self) -> DispatcherStatus {
        let entries = self.entries.read().await;
        DispatcherStatus {
            uptime: self.uptime_secs(),
            functions: entries
                .iter()
                .map(|(name, entry)| (name.clone(), entry.status()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000_000;

    #[tokio::test]
    async fn register_is_idempotent() {
        let table = FunctionTable::new(1);
        let a = table.register("echo", NOW).await;
        let b = table.register("echo", NOW + 5).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.last_accessed_ms(), NOW);
        assert_eq!(table.names().await, vec!["echo"]);
    }

    #[tokio::test]
    async fn active_guard_releases_once() {
        let table = FunctionTable::new(1);
        let entry = table.register("echo", NOW).await;
        {
            let _a = entry.enter();
            let _b = entry.enter();
            assert_eq!(entry.active_requests(), 2);
        }
        assert_eq!(entry.active_requests(), 0);
    }

    #[tokio::test]
    async fn ticket_records_exactly_once() {
        let table = FunctionTable::new(1);
        let entry = table.register("echo", NOW).await;
        let ticket = CallTicket::new(entry.clone());

        assert!(ticket.complete(CallOutcome::Timeout));
        assert!(!ticket.complete(CallOutcome::Success { response_time_ms: 1.0 }));
        assert!(ticket.is_recorded());

        let stats = entry.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.timeout_requests, 1);
        assert_eq!(stats.successful_requests, 0);
    }

    #[tokio::test]
    async fn cold_classification_counts_and_touch_warms() {
        let policy = ColdStartPolicy {
            idle_threshold_ms: 1_000,
            base_delay_ms: 50,
        };
        let table = FunctionTable::new(1);
        let entry = table.register("echo", NOW).await;

        let later = NOW + 5_000;
        let t = entry.classify(&policy, later);
        assert!(t.is_cold());
        assert!(t.delay() > std::time::Duration::ZERO);
        assert_eq!(entry.cold_starts(), 1);

        entry.touch(later);
        let t = entry.classify(&policy, later + 10);
        assert_eq!(t, Temperature::Warm);
        assert_eq!(entry.cold_starts(), 1);
    }

    #[tokio::test]
    async fn begin_call_counts_active_until_guard_drops() {
        let policy = ColdStartPolicy {
            idle_threshold_ms: 1_000,
            base_delay_ms: 50,
        };
        let table = FunctionTable::new(1);
        let call = table.begin_call("echo", &policy, NOW).await;
        assert_eq!(call.temperature, Temperature::Warm);
        assert_eq!(call.entry.active_requests(), 1);

        let entry = call.entry.clone();
        drop(call);
        assert_eq!(entry.active_requests(), 0);
    }

    #[tokio::test]
    async fn touch_never_moves_backwards() {
        let table = FunctionTable::new(1);
        let entry = table.register("echo", NOW).await;
        entry.touch(NOW + 100);
        entry.touch(NOW + 50);
        assert_eq!(entry.last_accessed_ms(), NOW + 100);
    }

    #[tokio::test]
    async fn apply_instances_only_touches_known_functions() {
        let table = FunctionTable::new(1);
        table.register("echo", NOW).await;

        let mut synced = BTreeMap::new();
        synced.insert("echo".to_string(), 4);
        synced.insert("ghost".to_string(), 9);

        assert_eq!(table.apply_instances(&synced).await, 1);
        assert_eq!(table.get("echo").await.unwrap().instances(), 4);
        assert!(table.get("ghost").await.is_none());
        // Same values again: nothing changes.
        assert_eq!(table.apply_instances(&synced).await, 0);
    }

    #[tokio::test]
    async fn status_snapshot() {
        let table = FunctionTable::new(2);
        let entry = table.register("echo", NOW).await;
        let _guard = entry.enter();
        CallTicket::new(entry.clone()).complete(CallOutcome::Success {
            response_time_ms: 4.0,
        });

        let status = table.status().await;
        let echo = &status.functions["echo"];
        assert_eq!(echo.instances, 2);
        assert_eq!(echo.active_requests, 1);
        assert_eq!(echo.stats.total_requests, 1);
        assert_eq!(echo.stats.avg_response_time, 4.0);
        assert!(status.uptime >= 0.0);
    }
}
