//! Error types for the sync engine.

use crate::types::ConnectionId;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in the sync engine.
///
/// An unknown session id is not an error: sessions are created empty on
/// first use.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A push to this connection failed; it has been (or must be) unregistered.
    #[error("connection {connection_id} lost")]
    ConnectionLost {
        /// The unreachable connection.
        connection_id: ConnectionId,
    },

    /// The connection is not registered (already gone).
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The engine has been shut down.
    #[error("sync engine is shutting down")]
    ShuttingDown,
}

impl SyncError {
    /// Creates a connection lost error.
    pub fn connection_lost(connection_id: ConnectionId) -> Self {
        Self::ConnectionLost { connection_id }
    }

    /// Returns true if the error concerns one connection only and leaves the
    /// session untouched.
    pub fn is_connection_local(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionLost { .. } | SyncError::UnknownConnection(_)
        )
    }
}

/// Error returned by a [`ConnectionSink`](crate::ConnectionSink).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The receiving side of the connection is gone.
    #[error("connection closed")]
    Closed,
}
