//! Per-key retry backoff

use std::time::Duration;

/// Exponential backoff for failed work items
///
/// The n-th consecutive failure of a key waits `base_delay * 2^(n-1)`,
/// capped at `max_delay`. Once a key has been requeued `max_retries` times
/// the next failure drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1000),
            max_retries: 15,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
        }
    }

    /// Delay before the retry following `failures` consecutive failures
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exponent = (failures - 1).min(63);
        let factor = 1u64 << exponent;
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base_ms.saturating_mul(factor));

        delay.min(self.max_delay)
    }

    /// Whether a key that has already been requeued `requeues` times may be
    /// requeued again
    pub fn should_retry(&self, requeues: u32) -> bool {
        requeues < self.max_retries
    }
}
