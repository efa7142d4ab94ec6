//! The last-writer-broadcast synchronization engine.

use crate::error::{SyncError, SyncResult};
use crate::registry::{ConnectionInfo, ConnectionRegistry};
use crate::sink::ConnectionSink;
use crate::store::DocumentStore;
use crate::types::{ConnectionId, DocumentSnapshot, DocumentUpdate, Revision, SessionId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters describing engine activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Number of sessions held in memory.
    pub sessions: usize,
    /// Number of live connections.
    pub connections: usize,
    /// Total number of accepted updates.
    pub updates_applied: u64,
    /// Total number of successful pushes to peers.
    pub pushes_delivered: u64,
    /// Total number of connections dropped because a push failed.
    pub connections_lost: u64,
}

/// Accepts full-document updates and broadcasts them to session peers.
///
/// ## Convergence model
///
/// Last write wins, no merge. An accepted update replaces the session's
/// content unconditionally; there is no diffing and no rejection of stale
/// writers. Two clients typing at the same time will see one of them
/// overwritten. That is the accepted behaviour of this protocol.
///
/// ## Ordering
///
/// All mutating operations on a session take that session's lock, so
/// updates form a total order (lock acquisition order) and each accepted
/// update bumps the revision by exactly one. Fan-out happens under the same
/// lock, after the store mutation, so every peer receives revisions in
/// increasing order and never before the store reflects them. Sessions do
/// not share locks and proceed in parallel.
pub struct SyncEngine {
    store: DocumentStore,
    registry: ConnectionRegistry,
    session_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    closed: AtomicBool,
    updates_applied: AtomicU64,
    pushes_delivered: AtomicU64,
    connections_lost: AtomicU64,
}

impl SyncEngine {
    /// Creates an engine with no sessions.
    pub fn new() -> Self {
        Self {
            store: DocumentStore::new(),
            registry: ConnectionRegistry::new(),
            session_locks: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            updates_applied: AtomicU64::new(0),
            pushes_delivered: AtomicU64::new(0),
            connections_lost: AtomicU64::new(0),
        }
    }

    fn session_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock();
        Arc::clone(locks.entry(session_id.clone()).or_default())
    }

    fn ensure_open(&self) -> SyncResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(SyncError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    /// Registers a connection in `session_id` and pushes the current
    /// document to it before returning.
    ///
    /// Registration happens under the session lock, so no update can slip
    /// in between the bootstrap snapshot and the connection becoming a
    /// broadcast target.
    pub fn connect(
        &self,
        session_id: &SessionId,
        sink: Arc<dyn ConnectionSink>,
    ) -> SyncResult<ConnectionId> {
        self.ensure_open()?;

        let lock = self.session_lock(session_id);
        let _guard = lock.lock();

        let snapshot = self.store.get(session_id);
        let id = match self.registry.register(session_id.clone(), sink, &snapshot) {
            Ok(id) => id,
            Err(e) => {
                self.release_if_idle(session_id, &lock);
                return Err(e);
            }
        };

        // A shutdown that raced with us may already have drained the registry.
        if self.closed.load(Ordering::SeqCst) {
            self.registry.unregister(id);
            self.release_if_idle(session_id, &lock);
            return Err(SyncError::ShuttingDown);
        }

        info!(
            connection = %id,
            session = %session_id,
            revision = snapshot.revision,
            "client connected"
        );
        Ok(id)
    }

    /// Accepts `content` as the new document of `session_id`.
    ///
    /// Returns the revision stamped on the update. The update is pushed to
    /// every other connection of the session; `origin` is skipped because it
    /// produced the content. Peers whose push fails are unregistered without
    /// affecting the others.
    pub fn apply(
        &self,
        session_id: &SessionId,
        origin: ConnectionId,
        content: impl Into<Arc<str>>,
    ) -> SyncResult<Revision> {
        self.ensure_open()?;
        let content = content.into();

        let lock = self.session_lock(session_id);
        let _guard = lock.lock();

        let revision = self.store.set(session_id, Arc::clone(&content));
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
        self.registry.acknowledge(origin, revision);

        let update = DocumentUpdate {
            session_id: session_id.clone(),
            content,
            revision,
        };
        let delivered = self.fan_out(&update, origin);

        debug!(
            session = %session_id,
            origin = %origin,
            revision,
            delivered,
            "update applied"
        );
        Ok(revision)
    }

    /// Pushes `update` to every peer of its session except `origin`.
    /// Caller holds the session lock.
    fn fan_out(&self, update: &DocumentUpdate, origin: ConnectionId) -> usize {
        let mut delivered = 0;
        for peer in self.registry.list_peers(&update.session_id, origin) {
            match self.registry.deliver(peer, update) {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                // Unregistered between listing and delivery.
                Err(SyncError::UnknownConnection(_)) => {}
                Err(e) => {
                    warn!(connection = %peer, session = %update.session_id, error = %e, "dropping unreachable connection");
                    if self.registry.unregister(peer) {
                        self.connections_lost.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
        self.pushes_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    /// Unregisters a connection. Idempotent; returns false if it was
    /// already gone.
    ///
    /// Session content and revision are untouched. When the last connection
    /// of a session that was never written to leaves, the session is
    /// forgotten.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let Some(info) = self.registry.connection(id) else {
            return false;
        };
        let session_id = info.session_id;

        let lock = self.session_lock(&session_id);
        let _guard = lock.lock();

        let removed = self.registry.unregister(id);
        if removed {
            info!(connection = %id, session = %session_id, "client disconnected");
            self.release_if_idle(&session_id, &lock);
        }
        removed
    }

    /// Drops per-session state once no connection remains. Caller holds
    /// the session lock.
    fn release_if_idle(&self, session_id: &SessionId, lock: &Arc<Mutex<()>>) {
        if self.registry.session_len(session_id) > 0 {
            return;
        }
        self.store.remove_if_untouched(session_id);

        // Keep the entry while another caller is queued on the same mutex.
        let mut locks = self.session_locks.lock();
        let idle = locks
            .get(session_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(session_id);
        }
    }

    /// Returns the current document of `session_id`, creating the session
    /// if needed.
    pub fn snapshot(&self, session_id: &SessionId) -> DocumentSnapshot {
        self.store.get(session_id)
    }

    /// Returns a connection's bookkeeping.
    pub fn connection(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.registry.connection(id)
    }

    /// Returns the number of live connections in `session_id`.
    pub fn session_connections(&self, session_id: &SessionId) -> usize {
        self.registry.session_len(session_id)
    }

    /// Returns all known session ids.
    pub fn sessions(&self) -> Vec<SessionId> {
        self.store.session_ids()
    }

    /// Stops accepting work and drops every connection.
    ///
    /// Dropping a connection drops its sink, which transports observe as a
    /// closed channel. Returns the number of connections dropped; calling it
    /// again returns 0.
    pub fn shutdown(&self) -> usize {
        if self.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let dropped = self.registry.drain();
        info!(connections = dropped, "sync engine shut down");
        dropped
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns activity counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            sessions: self.store.session_count(),
            connections: self.registry.len(),
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            pushes_delivered: self.pushes_delivered.load(Ordering::Relaxed),
            connections_lost: self.connections_lost.load(Ordering::Relaxed),
        }
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("stats", &self.stats())
            .field("closed", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn connect(engine: &SyncEngine, session: &SessionId) -> (ConnectionId, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let id = engine.connect(session, sink.clone()).unwrap();
        (id, sink)
    }

    #[test]
    fn bootstrap_of_untouched_session() {
        let engine = SyncEngine::new();
        let (_, sink) = connect(&engine, &SessionId::default());

        let bootstrap = sink.last().unwrap();
        assert_eq!(&*bootstrap.content, "");
        assert_eq!(bootstrap.revision, 0);
    }

    #[test]
    fn apply_broadcasts_to_peers_only() {
        let engine = SyncEngine::new();
        let session = SessionId::default();
        let (a, sink_a) = connect(&engine, &session);
        let (_b, sink_b) = connect(&engine, &session);

        assert_eq!(engine.apply(&session, a, "foo").unwrap(), 1);

        // A only ever got its bootstrap.
        assert_eq!(sink_a.len(), 1);
        let pushed = sink_b.last().unwrap();
        assert_eq!(&*pushed.content, "foo");
        assert_eq!(pushed.revision, 1);
        assert_eq!(engine.connection(a).unwrap().last_sent_revision, 1);
    }

    #[test]
    fn other_sessions_are_not_notified() {
        let engine = SyncEngine::new();
        let (a, _) = connect(&engine, &SessionId::from("one"));
        let (_, sink_two) = connect(&engine, &SessionId::from("two"));

        engine.apply(&SessionId::from("one"), a, "only here").unwrap();
        assert_eq!(sink_two.len(), 1);
        assert_eq!(engine.snapshot(&SessionId::from("two")).revision, 0);
    }

    #[test]
    fn dead_peer_is_dropped_without_affecting_others() {
        let engine = SyncEngine::new();
        let session = SessionId::default();
        let (a, _) = connect(&engine, &session);
        let (b, sink_b) = connect(&engine, &session);
        let (_c, sink_c) = connect(&engine, &session);

        sink_b.close();
        engine.apply(&session, a, "still works").unwrap();

        assert!(engine.connection(b).is_none());
        assert_eq!(&*sink_c.last().unwrap().content, "still works");
        let stats = engine.stats();
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.connections_lost, 1);
        assert_eq!(stats.pushes_delivered, 1);
    }

    #[test]
    fn disconnect_keeps_document() {
        let engine = SyncEngine::new();
        let session = SessionId::default();
        let (a, _) = connect(&engine, &session);
        engine.apply(&session, a, "kept").unwrap();

        assert!(engine.disconnect(a));
        assert!(!engine.disconnect(a));

        let snapshot = engine.snapshot(&session);
        assert_eq!(&*snapshot.content, "kept");
        assert_eq!(snapshot.revision, 1);
    }

    #[test]
    fn idle_sessions_are_released() {
        let engine = SyncEngine::new();
        for i in 0..1000 {
            let (id, _) = connect(&engine, &SessionId::new(format!("visitor-{i}")));
            assert!(engine.disconnect(id));
        }

        assert!(engine.sessions().is_empty());
        assert_eq!(engine.stats().connections, 0);
        assert!(engine.session_locks.lock().is_empty());
    }

    #[test]
    fn written_session_survives_last_disconnect() {
        let engine = SyncEngine::new();
        let busy = SessionId::from("busy");
        let (a, _) = connect(&engine, &busy);
        let (b, _) = connect(&engine, &busy);
        engine.apply(&busy, a, "kept").unwrap();

        assert!(engine.disconnect(a));
        assert!(engine.disconnect(b));
        assert_eq!(engine.sessions(), vec![busy.clone()]);

        let (_, sink) = connect(&engine, &busy);
        assert_eq!(&*sink.last().unwrap().content, "kept");
        assert_eq!(sink.last().unwrap().revision, 1);
    }

    #[test]
    fn apply_from_unregistered_origin_is_accepted() {
        let engine = SyncEngine::new();
        let session = SessionId::from("auto");
        let (_, sink) = connect(&engine, &session);

        let revision = engine.apply(&session, ConnectionId::new(), "x").unwrap();
        assert_eq!(revision, 1);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn shutdown_is_idempotent_and_final() {
        let engine = SyncEngine::new();
        let session = SessionId::default();
        let (a, _) = connect(&engine, &session);
        connect(&engine, &session);

        assert_eq!(engine.shutdown(), 2);
        assert_eq!(engine.shutdown(), 0);
        assert!(engine.is_shut_down());
        assert_eq!(engine.stats().connections, 0);

        assert_eq!(
            engine.apply(&session, a, "late").unwrap_err(),
            SyncError::ShuttingDown
        );
        assert_eq!(
            engine
                .connect(&session, Arc::new(MemorySink::new()))
                .unwrap_err(),
            SyncError::ShuttingDown
        );
    }

    #[test]
    fn failed_bootstrap_is_reported() {
        let engine = SyncEngine::new();
        let sink = Arc::new(MemorySink::new());
        sink.close();

        let err = engine.connect(&SessionId::default(), sink).unwrap_err();
        assert!(err.is_connection_local());
        assert_eq!(engine.stats().connections, 0);
        assert!(engine.sessions().is_empty());
    }
}
