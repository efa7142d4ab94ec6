//! Identifiers and document values shared across the engine.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Revision counter of a session's document. Starts at 0.
pub type Revision = u64;

/// Identifies one shared document.
///
/// Session ids are supplied by clients. An empty (or all-whitespace) id
/// maps to [`SessionId::DEFAULT`], so a single-document deployment is just
/// every client using the default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Arc<str>);

impl SessionId {
    /// Name of the implicit shared session.
    pub const DEFAULT: &'static str = "default";

    /// Creates a session id, normalising empty input to the default session.
    pub fn new(id: impl AsRef<str>) -> Self {
        let id = id.as_ref().trim();
        if id.is_empty() {
            Self::default_session()
        } else {
            Self(Arc::from(id))
        }
    }

    /// The implicit shared session.
    pub fn default_session() -> Self {
        Self(Arc::from(Self::DEFAULT))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::default_session()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Identifies one live client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session's document at one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    /// Full document text.
    pub content: Arc<str>,
    /// Revision this content was accepted at.
    pub revision: Revision,
}

impl DocumentSnapshot {
    /// The state of a session nobody has written to yet.
    pub fn empty() -> Self {
        Self {
            content: Arc::from(""),
            revision: 0,
        }
    }
}

impl Default for DocumentSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// A state push to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpdate {
    /// Session the update belongs to.
    pub session_id: SessionId,
    /// Full document text.
    pub content: Arc<str>,
    /// Revision of `content`.
    pub revision: Revision,
}

impl DocumentUpdate {
    /// Builds the update carrying `snapshot` for `session_id`.
    pub fn from_snapshot(session_id: SessionId, snapshot: &DocumentSnapshot) -> Self {
        Self {
            session_id,
            content: Arc::clone(&snapshot.content),
            revision: snapshot.revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_id_is_default() {
        assert_eq!(SessionId::new(""), SessionId::default_session());
        assert_eq!(SessionId::new("   ").as_str(), SessionId::DEFAULT);
        assert_eq!(SessionId::from("notes").as_str(), "notes");
    }

    #[test]
    fn session_id_serializes_as_string() {
        let json = serde_json::to_string(&SessionId::from("notes")).unwrap();
        assert_eq!(json, "\"notes\"");
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = DocumentSnapshot::empty();
        assert_eq!(&*snapshot.content, "");
        assert_eq!(snapshot.revision, 0);
    }
}
