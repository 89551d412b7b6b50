//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::RetryConfig;

/// Backoff schedule for retried HTTP calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based). Attempt 0 never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        let capped = base_ms
            .saturating_mul(2u64.saturating_pow(attempt - 1))
            .min(max_ms);

        // Up to 10% jitter on top of the capped delay.
        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}

impl From<&RetryConfig> for Backoff {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let b = backoff();
        assert_eq!(b.delay(0), Duration::ZERO);
        assert!(b.delay(1) >= Duration::from_millis(100));
        assert!(b.delay(2) >= Duration::from_millis(200));
        assert!(b.delay(3) >= Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        let b = backoff();
        let delay = b.delay(20);
        assert!(delay >= Duration::from_millis(1000));
        assert!(delay < Duration::from_millis(1100));
    }
}
