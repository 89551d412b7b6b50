//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (provider, explorer, notification channel):
//!     → rate_limit.rs (wait for a token in the resource's bucket)
//!     → HTTP request with client timeout
//!     → On transient failure: retries.rs (retry with backoff.rs delays)
//! ```
//!
//! # Design Decisions
//! - One bucket per external resource, constructed at startup and injected
//! - Timeouts are non-negotiable; every HTTP client has a deadline
//! - Only transport errors, 429 and 5xx are retried
//! - Notification flood control is handled by the notification stage: the
//!   chat API announces its own retry delay

pub mod backoff;
pub mod rate_limit;
pub mod retries;

pub use backoff::Backoff;
pub use rate_limit::RateLimiter;
