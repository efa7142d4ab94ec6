//! Outbound side of a connection.

use crate::error::SinkError;
use crate::types::DocumentUpdate;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Delivers document state to one client connection.
///
/// This trait abstracts the transport so the engine can be driven by a
/// WebSocket, a test recorder, or anything else. Implementations must not
/// block: the engine calls `deliver` while holding the session lock.
pub trait ConnectionSink: Send + Sync {
    /// Hands `update` to the connection's outbound queue.
    ///
    /// Returns [`SinkError::Closed`] if the connection can no longer
    /// receive.
    fn deliver(&self, update: &DocumentUpdate) -> Result<(), SinkError>;
}

/// A sink that records every update, for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    updates: Mutex<Vec<DocumentUpdate>>,
    closed: AtomicBool,
}

impl MemorySink {
    /// Creates an open, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all updates received so far.
    pub fn updates(&self) -> Vec<DocumentUpdate> {
        self.updates.lock().clone()
    }

    /// Returns the most recent update.
    pub fn last(&self) -> Option<DocumentUpdate> {
        self.updates.lock().last().cloned()
    }

    /// Returns how many updates were received.
    pub fn len(&self) -> usize {
        self.updates.lock().len()
    }

    /// Returns true if nothing was received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every further delivery fail, as if the client went away.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl ConnectionSink for MemorySink {
    fn deliver(&self, update: &DocumentUpdate) -> Result<(), SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        self.updates.lock().push(update.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentSnapshot, SessionId};

    #[test]
    fn memory_sink_records_until_closed() {
        let sink = MemorySink::new();
        let update = DocumentUpdate::from_snapshot(SessionId::default(), &DocumentSnapshot::empty());

        sink.deliver(&update).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.last(), Some(update.clone()));

        sink.close();
        assert_eq!(sink.deliver(&update), Err(SinkError::Closed));
        assert_eq!(sink.len(), 1);
    }
}
