//! Cold-start detection.
//!
//! A function is Warm while it has been accessed within the idle threshold
//! and Cold otherwise. A cold call pays a synthetic delay of
//! `base * (1 + U(0,1))`.

use std::time::Duration;

use rand::Rng;

use fngrid_core::FngridConfig;

/// Temperature of a function at the moment a call arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Temperature {
    Warm,
    Cold { delay: Duration },
}

impl Temperature {
    pub fn delay(self) -> Duration {
        match self {
            Temperature::Warm => Duration::ZERO,
            Temperature::Cold { delay } => delay,
        }
    }

    pub fn is_cold(self) -> bool {
        matches!(self, Temperature::Cold { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColdStartPolicy {
    pub idle_threshold_ms: u64,
    pub base_delay_ms: u64,
}

impl Default for ColdStartPolicy {
    fn default() -> Self {
        Self::from_config(&FngridConfig::default())
    }
}

impl ColdStartPolicy {
    pub fn from_config(config: &FngridConfig) -> Self {
        Self {
            idle_threshold_ms: config.cold_start_idle_threshold_ms,
            base_delay_ms: config.cold_start_base_delay_ms,
        }
    }

    /// Classify a call with an explicit jitter in `[0, 1)`.
    pub fn classify_with(&self, last_accessed_ms: u64, now_ms: u64, jitter: f64) -> Temperature {
        if now_ms.saturating_sub(last_accessed_ms) > self.idle_threshold_ms {
            let factor = 1.0 + jitter.clamp(0.0, 1.0);
            Temperature::Cold {
                delay: Duration::from_secs_f64(self.base_delay_ms as f64 * factor / 1000.0),
            }
        } else {
            Temperature::Warm
        }
    }

    /// Classify a call, drawing the jitter from the thread RNG.
    pub fn classify(&self, last_accessed_ms: u64, now_ms: u64) -> Temperature {
        let jitter: f64 = rand::thread_rng().r#gen();
        self.classify_with(last_accessed_ms, now_ms, jitter)
    }
}
