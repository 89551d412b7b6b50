//! Retry logic for outbound HTTP calls.
//!
//! Explorer and provider requests are idempotent reads (or a login that can
//! safely be repeated), so transport failures, `429` and `5xx` responses are
//! retried with backoff. Anything else is returned to the caller at once.

use std::future::Future;

use crate::resilience::backoff::Backoff;

/// Errors that know whether repeating the call might help.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Whether an HTTP status is worth retrying.
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retries<T, E, F, Fut>(backoff: &Backoff, what: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < backoff.max_attempts => {
                let delay = backoff.delay(attempt);
                tracing::debug!(call = what, attempt, delay = ?delay, error = %e, "Retrying request");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
