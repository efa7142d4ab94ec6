//! # padsync crypto
//!
//! Password-based encryption for secure save and open of documents.
//!
//! ## Security Model
//!
//! - PBKDF2-HMAC-SHA256 stretches the password with a random 16-byte salt
//! - AES-256-GCM with a random 96-bit nonce per payload
//! - The payload header (version, iterations, salt) is authenticated
//! - Wrong password and tampering are both reported as
//!   [`CryptoError::AuthenticationFailure`]; no partial plaintext escapes
//! - Derived keys are zeroized on drop
//!
//! ## Usage
//!
//! ```
//! use padsync_crypto::{open_text, KdfParams, PasswordCipher};
//!
//! let cipher = PasswordCipher::new(KdfParams::new(10_000)?);
//! let blob = cipher.seal_text("secret note", "pw123")?;
//! assert_eq!(open_text(&blob, "pw123")?, "secret note");
//! assert!(open_text(&blob, "wrongpw").is_err());
//! # Ok::<(), padsync_crypto::CryptoError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod cipher;
mod error;
mod kdf;
mod payload;

pub use cipher::{decrypt, open_text, PasswordCipher};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{
    generate_salt, DerivedKey, KdfParams, DEFAULT_ITERATIONS, KEY_SIZE, MAX_ITERATIONS,
    MIN_ITERATIONS, SALT_SIZE,
};
pub use payload::{EncryptedPayload, HEADER_SIZE, NONCE_SIZE, PAYLOAD_VERSION, TAG_SIZE};

/// Encrypts `plaintext` under `password` with default KDF parameters.
pub fn encrypt(plaintext: &[u8], password: &str) -> CryptoResult<EncryptedPayload> {
    PasswordCipher::default().encrypt(plaintext, password)
}
