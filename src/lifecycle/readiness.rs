//! One-shot readiness gate.
//!
//! The gate opens once every participant has arrived. It never closes again,
//! and arrivals after opening are no-ops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct Readiness {
    tx: Arc<watch::Sender<bool>>,
    pending: Arc<AtomicUsize>,
}

impl Readiness {
    /// Create a gate that opens after `participants` arrivals.
    ///
    /// A gate with no participants starts open.
    pub fn new(participants: usize) -> Self {
        let (tx, _) = watch::channel(participants == 0);
        Self {
            tx: Arc::new(tx),
            pending: Arc::new(AtomicUsize::new(participants)),
        }
    }

    /// Record one participant's arrival.
    pub fn arrive(&self) {
        let previous = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous == Ok(1) {
            self.tx.send_replace(true);
            tracing::info!("Readiness gate opened");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the gate opens.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readiness")
            .field("ready", &self.is_ready())
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .finish()
    }
}
