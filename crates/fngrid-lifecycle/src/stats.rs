//! Running per-function call statistics.

use fngrid_core::StatsView;

/// Terminal outcome of a single call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CallOutcome {
    /// Handler result without an error marker. Response time excludes any
    /// cold-start delay.
    Success { response_time_ms: f64 },
    /// Handler returned an error marker, failed, or panicked.
    Failure,
    /// The dispatcher gave up waiting.
    Timeout,
}

/// Counters and response-time aggregates for one function.
///
/// `successful + failed == total` holds after every `record`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub timeout_requests: u64,
    pub total_response_time_ms: f64,
    pub min_response_time_ms: Option<f64>,
    pub max_response_time_ms: f64,
}

impl RuntimeStats {
    pub fn record(&mut self, outcome: CallOutcome) {
        self.total_requests += 1;
        match outcome {
            CallOutcome::Success { response_time_ms } => {
                let t = response_time_ms.max(0.0);
                self.successful_requests += 1;
                self.total_response_time_ms += t;
                self.min_response_time_ms = Some(match self.min_response_time_ms {
                    Some(min) => min.min(t),
                    None => t,
                });
                self.max_response_time_ms = self.max_response_time_ms.max(t);
            }
            CallOutcome::Failure => {
                self.failed_requests += 1;
            }
            CallOutcome::Timeout => {
                self.failed_requests += 1;
                self.timeout_requests += 1;
            }
        }
    }

    /// Mean response time over successful calls.
    pub fn avg_response_time_ms(&self) -> f64 {
        if self.successful_requests == 0 {
            0.0
        } else {
            self.total_response_time_ms / self.successful_requests as f64
        }
    }

    pub fn view(&self) -> StatsView {
        StatsView {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            timeout_requests: self.timeout_requests,
            total_response_time: self.total_response_time_ms,
            avg_response_time: self.avg_response_time_ms(),
            min_response_time: self.min_response_time_ms,
            max_response_time: self.max_response_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats() {
        let stats = RuntimeStats::default();
        let view = stats.view();
        assert_eq!(view.total_requests, 0);
        assert_eq!(view.avg_response_time, 0.0);
        assert_eq!(view.min_response_time, None);
    }

    #[test]
    fn aggregates_successes() {
        let mut stats = RuntimeStats::default();
        stats.record(CallOutcome::Success { response_time_ms: 10.0 });
        stats.record(CallOutcome::Success { response_time_ms: 30.0 });
        stats.record(CallOutcome::Failure);

        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.successful_requests, 2);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.avg_response_time_ms(), 20.0);
        assert_eq!(stats.min_response_time_ms, Some(10.0));
        assert_eq!(stats.max_response_time_ms, 30.0);
    }

    #[test]
    fn timeout_counts_as_failure() {
        let mut stats = RuntimeStats::default();
        stats.record(CallOutcome::Timeout);
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.timeout_requests, 1);
        assert_eq!(
            stats.successful_requests + stats.failed_requests,
            stats.total_requests
        );
    }

    #[test]
    fn negative_times_are_clamped() {
        let mut stats = RuntimeStats::default();
        stats.record(CallOutcome::Success { response_time_ms: -3.0 });
        assert_eq!(stats.min_response_time_ms, Some(0.0));
        assert!(stats.avg_response_time_ms() >= 0.0);
    }
}
