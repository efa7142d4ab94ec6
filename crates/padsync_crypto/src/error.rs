//! Error types for the crypto pipeline.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while sealing or opening a document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Wrong password, or the ciphertext/tag/header was altered.
    ///
    /// Deliberately carries no detail: the two causes are indistinguishable.
    #[error("authentication failed: wrong password or corrupted data")]
    AuthenticationFailure,

    /// The payload could not be parsed before decryption was attempted.
    #[error("malformed payload: {message}")]
    MalformedPayload {
        /// Description of what was wrong.
        message: String,
    },

    /// An empty password was supplied.
    #[error("password must not be empty")]
    EmptyPassword,

    /// Key derivation parameters are out of range.
    #[error("invalid key derivation parameters: {message}")]
    InvalidParams {
        /// Description of the issue.
        message: String,
    },

    /// The cipher refused to encrypt.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CryptoError {
    /// Creates a malformed payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Creates an invalid parameters error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Creates an encryption failure error.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Returns true if the caller supplied bad input (password or payload)
    /// rather than hitting an internal failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CryptoError::EncryptionFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            CryptoError::AuthenticationFailure.to_string(),
            "authentication failed: wrong password or corrupted data"
        );
        let err = CryptoError::malformed("too short");
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn error_classification() {
        assert!(CryptoError::AuthenticationFailure.is_client_error());
        assert!(CryptoError::EmptyPassword.is_client_error());
        assert!(!CryptoError::encryption_failed("boom").is_client_error());
    }
}
