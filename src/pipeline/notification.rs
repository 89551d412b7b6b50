//! Notification stage.
//!
//! Consumes newly stored transaction hashes in arrival order, renders each
//! one and delivers it under the delivery rate limiter. Flood control is
//! honored by sleeping for exactly the requested time and trying again, for
//! as long as it takes. Other delivery errors abandon that message only.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::notify::{render_message, NotificationSink, NotifyError};
use crate::observability::metrics;
use crate::pipeline::PipelineError;
use crate::resilience::RateLimiter;
use crate::storage::{InsertOutcome, Storage};

pub struct NotificationStage {
    storage: Storage,
    sink: Arc<dyn NotificationSink>,
    limiter: Arc<RateLimiter>,
    chat_id: i64,
    rx: mpsc::UnboundedReceiver<String>,
}

/// What happened to one hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    AlreadyDelivered,
    Missing,
    Failed,
}

impl NotificationStage {
    pub fn new(
        storage: Storage,
        sink: Arc<dyn NotificationSink>,
        limiter: Arc<RateLimiter>,
        chat_id: i64,
        rx: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            storage,
            sink,
            limiter,
            chat_id,
            rx,
        }
    }

    pub async fn run(mut self) -> Result<(), PipelineError> {
        tracing::info!(chat_id = self.chat_id, "Starting notification delivery");

        while let Some(hash) = self.rx.recv().await {
            self.deliver(&hash).await?;
        }
        Err(PipelineError::ChannelClosed("transaction hashes"))
    }

    /// Announce one transaction unless it was announced before.
    pub async fn deliver(&self, hash: &str) -> Result<Delivery, PipelineError> {
        if self.storage.has_delivery(hash).await? {
            tracing::debug!(hash = %hash, "Already delivered");
            return Ok(Delivery::AlreadyDelivered);
        }

        let Some(details) = self.storage.load_transaction(hash).await? else {
            tracing::warn!(hash = %hash, "Transaction not found, skipping notification");
            return Ok(Delivery::Missing);
        };

        self.limiter.acquire().await;
        let message = render_message(&details);

        let message_id = loop {
            match self
                .sink
                .send(self.chat_id, &message.text, &message.link_url)
                .await
            {
                Ok(message_id) => break message_id,
                Err(NotifyError::Throttled { retry_after }) => {
                    metrics::record_notification_throttled();
                    tracing::warn!(hash = %hash, retry_after = ?retry_after, "Flood control, waiting");
                    tokio::time::sleep(retry_after).await;
                }
                Err(e) => {
                    tracing::error!(hash = %hash, error = %e, "Delivery failed, dropping message");
                    return Ok(Delivery::Failed);
                }
            }
        };

        metrics::record_notification_sent();
        match self
            .storage
            .record_delivery(self.chat_id, message_id, hash)
            .await?
        {
            InsertOutcome::Inserted => {
                tracing::info!(hash = %hash, message_id, "Transaction delivered");
            }
            InsertOutcome::Duplicate => {
                tracing::debug!(hash = %hash, message_id, "Delivery already recorded");
            }
        }
        Ok(Delivery::Sent)
    }
}
