//! Key material handling.
//!
//! - [`CryptKey`] resolves an asymmetric PEM key (inline or on disk) to a
//!   file path used for token signing.
//! - [`EncryptionKey`] is the symmetric AES-256-GCM key protecting the
//!   authorization-code and refresh-token payloads handed to clients.

pub mod crypt_key;
pub mod encryption;

pub use crypt_key::{CryptKey, CryptKeyError};
pub use encryption::{EncryptionError, EncryptionKey};
