//! AES-256-GCM sealing keyed by a password.

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{generate_salt, KdfParams};
use crate::payload::{EncryptedPayload, NONCE_SIZE};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

/// Encrypts documents under a password.
///
/// Every call draws a fresh salt and nonce, so sealing the same text twice
/// yields unrelated payloads. Opening needs nothing but the password: the
/// payload carries its own KDF parameters, salt and nonce.
#[derive(Debug, Clone, Default)]
pub struct PasswordCipher {
    params: KdfParams,
}

impl PasswordCipher {
    /// Creates a cipher that seals with the given KDF parameters.
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// Returns the KDF parameters used for sealing.
    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Encrypts `plaintext` under `password`.
    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> CryptoResult<EncryptedPayload> {
        let salt = generate_salt();
        let key = self.params.derive(password, &salt)?;
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        // Build with empty ciphertext first to get the header for AAD.
        let mut payload = EncryptedPayload::new(self.params, salt, nonce_bytes, Vec::new());
        let header = payload.header();
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: &header,
                },
            )
            .map_err(|_| CryptoError::encryption_failed("AES-GCM encryption error"))?;
        *payload.ciphertext_mut() = ciphertext;

        Ok(payload)
    }

    /// Encrypts text and returns the payload's transport-safe text form.
    pub fn seal_text(&self, text: &str, password: &str) -> CryptoResult<String> {
        Ok(self.encrypt(text.as_bytes(), password)?.encode())
    }
}

/// Decrypts a payload with `password`.
///
/// Fails closed: any mismatch yields [`CryptoError::AuthenticationFailure`]
/// and no plaintext.
pub fn decrypt(payload: &EncryptedPayload, password: &str) -> CryptoResult<Vec<u8>> {
    // Nothing is ever sealed under an empty password.
    if password.is_empty() {
        return Err(CryptoError::AuthenticationFailure);
    }
    let key = payload.params().derive(password, payload.salt())?;
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
    let header = payload.header();

    cipher
        .decrypt(
            Nonce::from_slice(payload.nonce()),
            Payload {
                msg: payload.ciphertext(),
                aad: &header,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailure)
}

/// Decodes a text payload and decrypts it to UTF-8 text.
pub fn open_text(encoded: &str, password: &str) -> CryptoResult<String> {
    let payload = EncryptedPayload::decode(encoded)?;
    let plaintext = decrypt(&payload, password)?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::malformed("decrypted document is not valid UTF-8"))
}
