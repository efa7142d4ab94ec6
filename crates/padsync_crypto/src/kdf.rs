//! Password key derivation.

use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the random salt in bytes.
pub const SALT_SIZE: usize = 16;
/// Default PBKDF2 iteration count for new payloads.
pub const DEFAULT_ITERATIONS: u32 = 600_000;
/// Lowest iteration count accepted when sealing or opening.
pub const MIN_ITERATIONS: u32 = 1_000;
/// Highest iteration count accepted when opening.
///
/// Bounds the work an uploaded payload can make the server do.
pub const MAX_ITERATIONS: u32 = 10_000_000;

/// Parameters for PBKDF2-HMAC-SHA256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
}

impl KdfParams {
    /// Creates parameters with the given iteration count.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidParams`] if the count is outside
    /// `MIN_ITERATIONS..=MAX_ITERATIONS`.
    pub fn new(iterations: u32) -> CryptoResult<Self> {
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations) {
            return Err(CryptoError::invalid_params(format!(
                "iteration count {iterations} outside {MIN_ITERATIONS}..={MAX_ITERATIONS}"
            )));
        }
        Ok(Self { iterations })
    }

    /// Returns the iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derives a key from `password` and `salt`.
    pub fn derive(&self, password: &str, salt: &[u8; SALT_SIZE]) -> CryptoResult<DerivedKey> {
        if password.is_empty() {
            return Err(CryptoError::EmptyPassword);
        }
        let mut bytes = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut bytes);
        Ok(DerivedKey { bytes })
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Generates a fresh random salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// A symmetric key derived from a password.
///
/// Zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
