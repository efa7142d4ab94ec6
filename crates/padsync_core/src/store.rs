//! Per-session document storage.

use crate::types::{DocumentSnapshot, Revision, SessionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Holds the current document of every session.
///
/// Each session's document sits behind its own lock and is replaced as a
/// whole, so readers see either the old or the new `(content, revision)`
/// pair and never a mix.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<SessionId, Arc<RwLock<DocumentSnapshot>>>>,
}

impl DocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `session_id`, creating an empty document if the
    /// session has never been seen.
    fn slot(&self, session_id: &SessionId) -> Arc<RwLock<DocumentSnapshot>> {
        if let Some(slot) = self.documents.read().get(session_id) {
            return Arc::clone(slot);
        }

        let mut documents = self.documents.write();
        Arc::clone(documents.entry(session_id.clone()).or_insert_with(|| {
            debug!(session = %session_id, "creating empty session");
            Arc::new(RwLock::new(DocumentSnapshot::empty()))
        }))
    }

    /// Returns the current document of `session_id`.
    ///
    /// Unknown sessions are created empty at revision 0.
    pub fn get(&self, session_id: &SessionId) -> DocumentSnapshot {
        self.slot(session_id).read().clone()
    }

    /// Replaces the document and bumps the revision by one.
    ///
    /// Only the engine calls this, under its per-session lock.
    pub(crate) fn set(&self, session_id: &SessionId, content: Arc<str>) -> Revision {
        let slot = self.slot(session_id);
        let mut document = slot.write();
        let revision = document.revision + 1;
        *document = DocumentSnapshot { content, revision };
        debug!(session = %session_id, revision, bytes = document.content.len(), "document replaced");
        revision
    }

    /// Forgets `session_id` if nobody ever wrote to it.
    ///
    /// Returns true if the entry was removed. Sessions with content are
    /// kept. Only the engine calls this, under its per-session lock.
    pub(crate) fn remove_if_untouched(&self, session_id: &SessionId) -> bool {
        let mut documents = self.documents.write();
        let untouched = documents
            .get(session_id)
            .is_some_and(|slot| slot.read().revision == 0);
        if untouched {
            documents.remove(session_id);
            debug!(session = %session_id, "released empty session");
        }
        untouched
    }

    /// Returns true if the session exists.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.documents.read().contains_key(session_id)
    }

    /// Returns the number of sessions.
    pub fn session_count(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns all session ids, sorted.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.documents.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_session_is_created_empty() {
        let store = DocumentStore::new();
        let id = SessionId::from("fresh");
        assert!(!store.contains(&id));

        let snapshot = store.get(&id);
        assert_eq!(snapshot, DocumentSnapshot::empty());
        assert!(store.contains(&id));
    }

    #[test]
    fn set_replaces_and_increments() {
        let store = DocumentStore::new();
        let id = SessionId::default();

        assert_eq!(store.set(&id, Arc::from("hello")), 1);
        assert_eq!(store.set(&id, Arc::from("hello world")), 2);

        let snapshot = store.get(&id);
        assert_eq!(&*snapshot.content, "hello world");
        assert_eq!(snapshot.revision, 2);
    }

    #[test]
    fn only_untouched_sessions_are_removed() {
        let store = DocumentStore::new();
        let empty = SessionId::from("empty");
        let written = SessionId::from("written");
        store.get(&empty);
        store.set(&written, Arc::from("keep me"));

        assert!(store.remove_if_untouched(&empty));
        assert!(!store.remove_if_untouched(&empty));
        assert!(!store.remove_if_untouched(&written));
        assert_eq!(store.session_ids(), vec![written]);
    }

    #[test]
    fn sessions_are_independent() {
        let store = DocumentStore::new();
        let a = SessionId::from("a");
        let b = SessionId::from("b");

        store.set(&a, Arc::from("alpha"));
        assert_eq!(store.get(&b), DocumentSnapshot::empty());
        assert_eq!(store.session_ids(), vec![a, b]);
        assert_eq!(store.session_count(), 2);
    }
}
