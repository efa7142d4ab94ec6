//! Shutdown signalling.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// A cloneable, idempotent shutdown trigger.
///
/// Unlike a broadcast, waiters that subscribe after the trigger still see
/// it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Creates an untriggered handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests shutdown. Returns true for the first call only.
    pub fn trigger(&self) -> bool {
        let first = !self.tx.send_replace(true);
        if first {
            info!("shutdown requested");
        } else {
            warn!("shutdown already in progress");
        }
        first
    }

    /// Returns true once shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
