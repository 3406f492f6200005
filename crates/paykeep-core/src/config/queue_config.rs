use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Retry policy for queued mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Failed replay attempts before an entry becomes terminally failed.
    pub max_attempts: u32,
    /// Backoff base; the delay after `n` failures is `base * 2^n`.
    pub backoff_base_ms: u64,
    /// Upper bound on a single backoff delay.
    pub backoff_max_ms: u64,
    /// Lifetime of the lease a sweep takes on an entry it is transmitting.
    pub reservation_ttl_secs: u64,
}

impl QueueConfig {
    /// Delay before the next attempt after `attempts` failures, capped.
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.min(32);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let millis = self
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.backoff_max_ms);
        Duration::from_millis(millis)
    }

    pub fn reservation_ttl(&self) -> Duration {
        Duration::from_secs(self.reservation_ttl_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: defaults::DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: defaults::DEFAULT_BACKOFF_MAX_MS,
            reservation_ttl_secs: defaults::DEFAULT_RESERVATION_TTL_SECS,
        }
    }
}
