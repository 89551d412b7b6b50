//! Token bucket rate limiting for outbound calls.
//!
//! Every external resource the tracker talks to (provider login + listing,
//! the transaction sweep, notification delivery) gets its own bucket.
//! Callers `acquire()` before touching the resource and are suspended until
//! a token is available.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// A token bucket tracked as its theoretical arrival time.
///
/// Tokens refill one every `interval`; up to `capacity` may be banked.
/// Using instants rather than fractional token counts keeps admission exact:
/// with a capacity of one, consecutive acquisitions are never closer than
/// `interval`.
struct TokenBucket {
    /// Instant at which the bucket would be completely full again.
    full_at: Instant,
}

impl TokenBucket {
    fn new() -> Self {
        Self {
            full_at: Instant::now(),
        }
    }

    /// Take a token, or report how long until one is available.
    fn try_acquire(&mut self, interval: Duration, burst: Duration) -> Result<(), Duration> {
        let now = Instant::now();
        let full_at = self.full_at.max(now);
        let debt = full_at - now;

        if debt <= burst {
            self.full_at = full_at + interval;
            Ok(())
        } else {
            Err(debt - burst)
        }
    }
}

/// An async rate limiter over a single bucket.
pub struct RateLimiter {
    name: String,
    interval: Duration,
    burst: Duration,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Create a limiter admitting `capacity` acquisitions per `period`.
    pub fn new(name: impl Into<String>, capacity: u32, period: Duration) -> Self {
        let capacity = capacity.max(1);
        let interval = period / capacity;
        Self {
            name: name.into(),
            interval,
            burst: period - interval,
            bucket: Mutex::new(TokenBucket::new()),
        }
    }

    /// Create a limiter admitting a single acquisition per `period`.
    pub fn per_period(name: impl Into<String>, period: Duration) -> Self {
        Self::new(name, 1, period)
    }

    /// Wait until a token is available and consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                match bucket.try_acquire(self.interval, self.burst) {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };

            tracing::trace!(limiter = %self.name, wait = ?wait, "Rate limited, waiting for token");
            sleep(wait).await;
        }
    }

    /// Bucket name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::per_period("test", Duration::from_secs(60));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_acquire_waits_full_period() {
        let limiter = RateLimiter::per_period("test", Duration::from_secs(60));
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_admission_per_period_under_contention() {
        let period = Duration::from_secs(1);
        let limiter = Arc::new(RateLimiter::per_period("delivery", period));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            }));
        }

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        for pair in admitted.windows(2) {
            assert!(pair[1] - pair[0] >= period, "admissions closer than one period");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_buckets_are_independent() {
        let slow = RateLimiter::per_period("slow", Duration::from_secs(600));
        let fast = RateLimiter::per_period("fast", Duration::from_secs(1));

        slow.acquire().await;
        let start = Instant::now();
        fast.acquire().await;
        fast.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_allows_burst() {
        let limiter = RateLimiter::new("burst", 3, Duration::from_secs(3));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
