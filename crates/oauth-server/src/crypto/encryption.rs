//! Symmetric encryption of client-held payloads using AES-256-GCM.
//!
//! Authorization codes and refresh tokens are opaque to clients: they carry
//! an encrypted JSON payload that only this server can read back. The wire
//! form is `base64(nonce || ciphertext)` with a random 96-bit nonce.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;

use crate::error::{Fault, OAuthError};

/// Nonce size for AES-256-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
const KEY_SIZE: usize = 32;

/// Errors from the symmetric encryption layer.
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    /// The key string could not be parsed into 32 bytes.
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    /// The ciphertext could not be decoded or authenticated.
    #[error("Decryption failed: {0}")]
    Decrypt(String),
}

impl From<EncryptionError> for Fault {
    fn from(err: EncryptionError) -> Self {
        match err {
            EncryptionError::InvalidKey(_) => Fault::Configuration {
                message: err.to_string(),
            },
            EncryptionError::Encrypt(_) | EncryptionError::Decrypt(_) => Fault::Crypto {
                message: err.to_string(),
            },
        }
    }
}

impl From<EncryptionError> for OAuthError {
    fn from(err: EncryptionError) -> Self {
        OAuthError::Fault(err.into())
    }
}

/// A 256-bit AES-GCM key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Generates a random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    /// Parses a key from a hex or base64 string.
    pub fn parse(key_str: &str) -> Result<Self, EncryptionError> {
        let key_str = key_str.trim();

        // Try hex first
        if key_str.len() == KEY_SIZE * 2
            && let Ok(bytes) = hex::decode(key_str)
        {
            let mut key = [0u8; KEY_SIZE];
            key.copy_from_slice(&bytes);
            return Ok(Self(key));
        }

        let bytes = BASE64
            .decode(key_str)
            .map_err(|e| EncryptionError::InvalidKey(format!("not hex or base64: {e}")))?;

        let key: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            EncryptionError::InvalidKey(format!(
                "key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;

        Ok(Self(key))
    }

    /// Encrypts `plaintext` into `base64(nonce || ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| EncryptionError::Encrypt(format!("failed to create cipher: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| EncryptionError::Encrypt(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(out))
    }

    /// Decrypts a value produced by [`EncryptionKey::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> Result<String, EncryptionError> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| EncryptionError::Decrypt(format!("invalid base64: {e}")))?;

        if raw.len() <= NONCE_SIZE {
            return Err(EncryptionError::Decrypt("payload too short".into()));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| EncryptionError::Decrypt(format!("failed to create cipher: {e}")))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| EncryptionError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| EncryptionError::Decrypt(format!("invalid UTF-8: {e}")))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}
