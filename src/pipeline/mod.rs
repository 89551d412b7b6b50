//! The three-stage tracking pipeline.
//!
//! # Data Flow
//! ```text
//! discovery.rs     providers → wallets table ──┐ readiness
//!                                              ▼
//! ingestion.rs     wallets → explorers → transactions table
//!                                              │ new hashes (unbounded mpsc)
//!                                              ▼
//! notification.rs  hash → render → sink → deliveries table
//! ```
//!
//! `supervisor.rs` runs the stages side by side and stops all of them as soon
//! as one returns.

pub mod discovery;
pub mod ingestion;
pub mod notification;
pub mod supervisor;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::TrackerConfig;
use crate::providers::ProviderHost;
use crate::resilience::RateLimiter;
use crate::storage::StorageError;

pub use discovery::{DiscoveryStage, ProviderSlot};
pub use ingestion::IngestionStage;
pub use notification::NotificationStage;
pub use supervisor::{Pipeline, PipelineSettings};

/// Errors that stop a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("stage '{0}' exited")]
    StageExited(&'static str),

    #[error("stage '{stage}' failed: {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("stage task panicked or was cancelled: {0}")]
    Join(String),
}

/// The rate limiters shared by the stages.
#[derive(Debug, Clone)]
pub struct RateLimiters {
    /// One bucket per provider, guarding login and listing.
    pub providers: HashMap<ProviderHost, Arc<RateLimiter>>,
    /// One token per transaction sweep.
    pub sweep: Arc<RateLimiter>,
    /// One token per delivered message.
    pub delivery: Arc<RateLimiter>,
}

impl RateLimiters {
    /// Build the buckets described by `config`.
    pub fn from_config(config: &TrackerConfig) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|provider| {
                let name = format!("provider:{}", provider.host);
                let limiter = RateLimiter::per_period(name, config.refresh_period(provider));
                (provider.host, Arc::new(limiter))
            })
            .collect();

        // Sweep often enough for the most eager provider; slower ones are
        // skipped per wallet until their own period has passed.
        let sweep_period = config
            .providers
            .iter()
            .map(|provider| config.poll_period(provider))
            .chain(std::iter::once(Duration::from_secs(
                config.ingestion.poll_period_secs,
            )))
            .min()
            .unwrap_or(Duration::from_secs(config.ingestion.poll_period_secs));

        Self {
            providers,
            sweep: Arc::new(RateLimiter::per_period("sweep", sweep_period)),
            delivery: Arc::new(RateLimiter::per_period(
                "delivery",
                Duration::from_millis(config.telegram.delivery_period_ms),
            )),
        }
    }
}
