//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Backoff schedule used by reconnecting loops and REST retries.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    /// Upper bound of the schedule, before jitter.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential = 2u64.saturating_pow(attempt - 1);
        let capped = self.base_ms.saturating_mul(exponential).min(self.max_ms);

        // Jitter up to 10% on top of the capped delay
        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped.saturating_add(jitter))
    }
}

impl From<&RetryConfig> for Backoff {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.base_delay_ms, config.max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_delay() {
        assert_eq!(Backoff::new(100, 1500).max_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        let backoff = Backoff::new(100, 1000);

        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert!(backoff.delay(1).as_millis() >= 100);
        assert!(backoff.delay(2).as_millis() >= 200);

        let capped = backoff.delay(10).as_millis();
        assert!((1000..1100).contains(&capped));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let backoff = Backoff::new(u64::MAX / 2, u64::MAX);
        assert!(backoff.delay(64) > Duration::ZERO);
    }
}
