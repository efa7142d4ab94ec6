//! Bookkeeping of live connections.

use crate::error::{SyncError, SyncResult};
use crate::sink::ConnectionSink;
use crate::types::{ConnectionId, DocumentSnapshot, DocumentUpdate, Revision, SessionId};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Public view of a registered connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    /// Connection id.
    pub id: ConnectionId,
    /// Session the connection belongs to.
    pub session_id: SessionId,
    /// Revision delivered in the bootstrap push.
    pub joined_at_revision: Revision,
    /// Latest revision this connection is known to hold.
    pub last_sent_revision: Revision,
}

struct ConnectionEntry {
    info: ConnectionInfo,
    sink: Arc<dyn ConnectionSink>,
}

/// Tracks which connections are live in which session.
///
/// The registry holds no document content. Dropping an entry drops its
/// sink, which is how transports learn that a connection was closed from
/// the engine side.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and delivers `bootstrap` to it.
    ///
    /// The bootstrap push happens before the entry is inserted; if it
    /// fails, nothing is registered and [`SyncError::ConnectionLost`] is
    /// returned.
    pub fn register(
        &self,
        session_id: SessionId,
        sink: Arc<dyn ConnectionSink>,
        bootstrap: &DocumentSnapshot,
    ) -> SyncResult<ConnectionId> {
        let id = ConnectionId::new();
        let update = DocumentUpdate::from_snapshot(session_id.clone(), bootstrap);
        sink.deliver(&update)
            .map_err(|_| SyncError::connection_lost(id))?;

        let info = ConnectionInfo {
            id,
            session_id,
            joined_at_revision: bootstrap.revision,
            last_sent_revision: bootstrap.revision,
        };
        debug!(connection = %id, session = %info.session_id, revision = bootstrap.revision, "connection registered");
        self.connections
            .write()
            .insert(id, ConnectionEntry { info, sink });
        Ok(id)
    }

    /// Removes a connection. Returns false if it was not registered.
    ///
    /// Safe to call repeatedly and from failure paths.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.write().remove(&id);
        match removed {
            Some(entry) => {
                debug!(connection = %id, session = %entry.info.session_id, "connection unregistered");
                true
            }
            None => false,
        }
    }

    /// Lists the connections of `session_id` other than `excluding`.
    pub fn list_peers(&self, session_id: &SessionId, excluding: ConnectionId) -> Vec<ConnectionId> {
        self.connections
            .read()
            .values()
            .filter(|entry| entry.info.session_id == *session_id && entry.info.id != excluding)
            .map(|entry| entry.info.id)
            .collect()
    }

    /// Pushes `update` to a connection and records its revision.
    ///
    /// Returns `Ok(false)` without pushing if the connection already holds
    /// `update.revision` or newer.
    pub fn deliver(&self, id: ConnectionId, update: &DocumentUpdate) -> SyncResult<bool> {
        let sink = {
            let connections = self.connections.read();
            let entry = connections
                .get(&id)
                .ok_or(SyncError::UnknownConnection(id))?;
            if entry.info.last_sent_revision >= update.revision {
                return Ok(false);
            }
            Arc::clone(&entry.sink)
        };

        sink.deliver(update)
            .map_err(|_| SyncError::connection_lost(id))?;
        self.acknowledge(id, update.revision);
        Ok(true)
    }

    /// Records that a connection holds `revision` without pushing anything.
    ///
    /// Used for the origin of an update, which already has the content.
    pub fn acknowledge(&self, id: ConnectionId, revision: Revision) -> bool {
        match self.connections.write().get_mut(&id) {
            Some(entry) => {
                entry.info.last_sent_revision = entry.info.last_sent_revision.max(revision);
                true
            }
            None => false,
        }
    }

    /// Returns a connection's info.
    pub fn connection(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.read().get(&id).map(|entry| entry.info.clone())
    }

    /// Returns the number of live connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns true if no connection is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of live connections in `session_id`.
    pub fn session_len(&self, session_id: &SessionId) -> usize {
        self.connections
            .read()
            .values()
            .filter(|entry| entry.info.session_id == *session_id)
            .count()
    }

    /// Removes every connection and returns how many there were.
    pub fn drain(&self) -> usize {
        let drained = std::mem::take(&mut *self.connections.write());
        // Sinks are dropped here, outside the lock.
        drained.len()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn snapshot(content: &str, revision: Revision) -> DocumentSnapshot {
        DocumentSnapshot {
            content: Arc::from(content),
            revision,
        }
    }

    #[test]
    fn register_delivers_bootstrap() {
        let registry = ConnectionRegistry::new();
        let sink = Arc::new(MemorySink::new());
        let session = SessionId::default();

        let id = registry
            .register(session.clone(), sink.clone(), &snapshot("hello", 1))
            .unwrap();

        let received = sink.last().unwrap();
        assert_eq!(&*received.content, "hello");
        assert_eq!(received.revision, 1);

        let info = registry.connection(id).unwrap();
        assert_eq!(info.joined_at_revision, 1);
        assert_eq!(info.last_sent_revision, 1);
        assert_eq!(info.session_id, session);
    }

    #[test]
    fn failed_bootstrap_registers_nothing() {
        let registry = ConnectionRegistry::new();
        let sink = Arc::new(MemorySink::new());
        sink.close();

        let err = registry
            .register(SessionId::default(), sink, &DocumentSnapshot::empty())
            .unwrap_err();
        assert!(matches!(err, SyncError::ConnectionLost { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = registry
            .register(SessionId::default(), Arc::new(MemorySink::new()), &DocumentSnapshot::empty())
            .unwrap();

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(!registry.unregister(ConnectionId::new()));
    }

    #[test]
    fn peers_exclude_origin_and_other_sessions() {
        let registry = ConnectionRegistry::new();
        let main = SessionId::from("main");
        let other = SessionId::from("other");
        let empty = DocumentSnapshot::empty();

        let a = registry.register(main.clone(), Arc::new(MemorySink::new()), &empty).unwrap();
        let b = registry.register(main.clone(), Arc::new(MemorySink::new()), &empty).unwrap();
        let _c = registry.register(other.clone(), Arc::new(MemorySink::new()), &empty).unwrap();

        assert_eq!(registry.list_peers(&main, a), vec![b]);
        let mut all = registry.list_peers(&main, ConnectionId::new());
        all.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(all, expected);
        assert_eq!(registry.session_len(&other), 1);
    }

    #[test]
    fn deliver_skips_stale_revisions() {
        let registry = ConnectionRegistry::new();
        let sink = Arc::new(MemorySink::new());
        let session = SessionId::default();
        let id = registry.register(session.clone(), sink.clone(), &snapshot("a", 3)).unwrap();

        let stale = DocumentUpdate::from_snapshot(session.clone(), &snapshot("old", 3));
        assert!(!registry.deliver(id, &stale).unwrap());

        let fresh = DocumentUpdate::from_snapshot(session, &snapshot("new", 4));
        assert!(registry.deliver(id, &fresh).unwrap());
        assert_eq!(sink.len(), 2);
        assert_eq!(registry.connection(id).unwrap().last_sent_revision, 4);
    }

    #[test]
    fn deliver_to_closed_sink_reports_loss() {
        let registry = ConnectionRegistry::new();
        let sink = Arc::new(MemorySink::new());
        let session = SessionId::default();
        let id = registry.register(session.clone(), sink.clone(), &DocumentSnapshot::empty()).unwrap();

        sink.close();
        let update = DocumentUpdate::from_snapshot(session, &snapshot("x", 1));
        assert_eq!(
            registry.deliver(id, &update).unwrap_err(),
            SyncError::connection_lost(id)
        );
        // Loss is reported, removal is the caller's decision.
        assert!(registry.connection(id).is_some());
    }

    #[test]
    fn drain_removes_everything() {
        let registry = ConnectionRegistry::new();
        for _ in 0..3 {
            registry
                .register(SessionId::default(), Arc::new(MemorySink::new()), &DocumentSnapshot::empty())
                .unwrap();
        }
        assert_eq!(registry.drain(), 3);
        assert!(registry.is_empty());
        assert_eq!(registry.drain(), 0);
    }
}
