//! Encrypted payload framing and text encoding.
//!
//! Binary layout (version 1):
//!
//! ```text
//! version (1) || iterations (4, BE) || salt (16) || nonce (12) || ciphertext || tag (16)
//! ```
//!
//! The text form is standard base64 of the binary layout, so a payload can
//! be saved as a plain text file and uploaded again later.

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{KdfParams, SALT_SIZE};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Current payload format version.
pub const PAYLOAD_VERSION: u8 = 1;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// Size of the authenticated header (version, iterations, salt).
pub const HEADER_SIZE: usize = 1 + 4 + SALT_SIZE;

/// A self-describing encrypted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    params: KdfParams,
    salt: [u8; SALT_SIZE],
    nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the GCM tag appended.
    ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    pub(crate) fn new(
        params: KdfParams,
        salt: [u8; SALT_SIZE],
        nonce: [u8; NONCE_SIZE],
        ciphertext: Vec<u8>,
    ) -> Self {
        Self {
            params,
            salt,
            nonce,
            ciphertext,
        }
    }

    /// Key derivation parameters used to seal this payload.
    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// The salt fed to key derivation.
    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    /// The AES-GCM nonce.
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Ciphertext followed by the authentication tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Mutable access to the ciphertext, for corruption tests.
    #[doc(hidden)]
    pub fn ciphertext_mut(&mut self) -> &mut Vec<u8> {
        &mut self.ciphertext
    }

    /// Header bytes bound into the tag as associated data.
    pub(crate) fn header(&self) -> [u8; HEADER_SIZE] {
        header_bytes(self.params, &self.salt)
    }

    /// Serializes to the binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.header());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parses the binary layout.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedPayload`] if the frame is truncated,
    /// has an unknown version, or carries out-of-range KDF parameters.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < HEADER_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::malformed(format!(
                "payload too short: {} bytes",
                bytes.len()
            )));
        }

        let version = bytes[0];
        if version != PAYLOAD_VERSION {
            return Err(CryptoError::malformed(format!(
                "unsupported payload version {version}"
            )));
        }

        let mut iterations = [0u8; 4];
        iterations.copy_from_slice(&bytes[1..5]);
        let params = KdfParams::new(u32::from_be_bytes(iterations))
            .map_err(|e| CryptoError::malformed(e.to_string()))?;

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[5..HEADER_SIZE]);

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + NONCE_SIZE]);

        let ciphertext = bytes[HEADER_SIZE + NONCE_SIZE..].to_vec();

        Ok(Self {
            params,
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Encodes the payload as transport-safe text.
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decodes a payload from its text form. Surrounding whitespace is
    /// ignored.
    pub fn decode(text: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::malformed(format!("invalid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

fn header_bytes(params: KdfParams, salt: &[u8; SALT_SIZE]) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0] = PAYLOAD_VERSION;
    header[1..5].copy_from_slice(&params.iterations().to_be_bytes());
    header[5..].copy_from_slice(salt);
    header
}
