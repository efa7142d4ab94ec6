//! Error types for the server.

use padsync_core::SyncError;
use padsync_crypto::CryptoError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A WebSocket frame that cannot be used as a document.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An uploaded file could not be read.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// Sealing or opening an encrypted document failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Sync engine error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A blocking task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if the requester caused the error.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::MalformedFrame(_)
            | ServerError::UploadFailed(_) => true,
            ServerError::Crypto(e) => e.is_client_error(),
            ServerError::Sync(e) => e.is_connection_local(),
            ServerError::Internal(_) | ServerError::Io(_) => false,
        }
    }
}
