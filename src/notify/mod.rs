//! Notification delivery.
//!
//! `render` turns a stored transaction into message text; a
//! [`NotificationSink`] delivers it. Sinks report flood control as
//! [`NotifyError::Throttled`] so the caller can wait and try again.

pub mod render;
pub mod telegram;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use render::{format_amount, render_message, RenderedMessage};
pub use telegram::TelegramNotifier;

/// A chat that can receive transaction messages.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text` with a button linking to `link_url`; returns the message id.
    async fn send(&self, chat_id: i64, text: &str, link_url: &str) -> NotifyResult<i64>;
}

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("notification API error: {0}")]
    Api(String),

    /// Flood control; nothing was delivered.
    #[error("throttled, retry after {retry_after:?}")]
    Throttled { retry_after: Duration },
}

pub type NotifyResult<T> = Result<T, NotifyError>;
