//! Pipeline supervisor.
//!
//! Wires the stages together and runs them as separate tasks. The first stage
//! to return, for any reason, takes the others down with it; so does the
//! shutdown signal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::blockchain::ChainSources;
use crate::lifecycle::{Readiness, Shutdown};
use crate::notify::NotificationSink;
use crate::pipeline::discovery::{DiscoveryStage, ProviderSlot};
use crate::pipeline::ingestion::IngestionStage;
use crate::pipeline::notification::NotificationStage;
use crate::pipeline::{PipelineError, RateLimiters};
use crate::providers::ProviderHost;
use crate::resilience::RateLimiter;
use crate::storage::Storage;

/// Settings that are not owned by any single collaborator.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chat_id: i64,
    pub default_poll_period: Duration,
    pub poll_periods: HashMap<ProviderHost, Duration>,
}

/// The assembled pipeline, ready to run.
pub struct Pipeline {
    discovery: DiscoveryStage,
    ingestion: IngestionStage,
    notification: NotificationStage,
}

impl Pipeline {
    pub fn new(
        storage: Storage,
        providers: Vec<ProviderSlot>,
        sources: ChainSources,
        sink: Arc<dyn NotificationSink>,
        limiters: RateLimiters,
        settings: PipelineSettings,
    ) -> Self {
        let readiness = Readiness::new(providers.len());
        let (tx, rx) = mpsc::unbounded_channel();

        let providers = providers
            .into_iter()
            .map(|slot| {
                let limiter = limiters.providers.get(&slot.host).cloned().unwrap_or_else(|| {
                    Arc::new(RateLimiter::per_period(
                        format!("provider:{}", slot.host),
                        slot.refresh_period,
                    ))
                });
                (slot, limiter)
            })
            .collect();

        Self {
            discovery: DiscoveryStage::new(providers, storage.clone(), readiness.clone()),
            ingestion: IngestionStage::new(
                storage.clone(),
                sources,
                readiness,
                limiters.sweep,
                settings.poll_periods,
                settings.default_poll_period,
                tx,
            ),
            notification: NotificationStage::new(
                storage,
                sink,
                limiters.delivery,
                settings.chat_id,
                rx,
            ),
        }
    }

    /// Run until shutdown is triggered or a stage stops.
    ///
    /// Returns `Ok(())` only for a requested shutdown.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), PipelineError> {
        let mut tasks = JoinSet::new();
        let Pipeline {
            discovery,
            ingestion,
            notification,
        } = self;

        tasks.spawn(async move { ("discovery", discovery.run().await) });
        tasks.spawn(async move { ("ingestion", ingestion.run().await) });
        tasks.spawn(async move { ("notification", notification.run().await) });

        let result = tokio::select! {
            _ = shutdown.wait() => Ok(()),
            Some(joined) = tasks.join_next() => match joined {
                Ok((stage, Ok(()))) => Err(PipelineError::StageExited(stage)),
                Ok((stage, Err(e))) => Err(PipelineError::StageFailed {
                    stage,
                    source: Box::new(e),
                }),
                Err(e) => Err(PipelineError::Join(e.to_string())),
            },
        };

        if let Err(e) = &result {
            tracing::error!(error = %e, "Pipeline stage stopped, shutting down");
        }
        shutdown.trigger();
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        tracing::info!("Pipeline stopped");
        result
    }
}
