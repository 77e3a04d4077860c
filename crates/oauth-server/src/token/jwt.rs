//! RS256 access-token signing.
//!
//! An access token becomes a compact JWS with a fixed claim set:
//!
//! | Claim    | Value                                    |
//! |----------|------------------------------------------|
//! | `aud`    | client identifier                        |
//! | `jti`    | token identifier                         |
//! | `iat`    | now                                      |
//! | `nbf`    | now                                      |
//! | `exp`    | token expiry                             |
//! | `sub`    | user identifier, omitted for client-only |
//! | `scopes` | granted scope identifiers                |

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::crypto::{CryptKey, CryptKeyError};
use crate::error::{Fault, OAuthError};
use crate::types::AccessToken;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while minting a bearer credential.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// The signing key could not be read or parsed.
    #[error("Invalid signing key: {message}")]
    InvalidKey {
        /// Description of the key problem.
        message: String,
    },

    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },
}

impl JwtError {
    /// Creates an invalid key error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates an encoding error.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }
}

impl From<CryptKeyError> for JwtError {
    fn from(err: CryptKeyError) -> Self {
        Self::invalid_key(err.to_string())
    }
}

impl From<JwtError> for Fault {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::InvalidKey { .. } => Fault::Configuration {
                message: err.to_string(),
            },
            JwtError::EncodingError { .. } => Fault::Crypto {
                message: err.to_string(),
            },
        }
    }
}

impl From<JwtError> for OAuthError {
    fn from(err: JwtError) -> Self {
        OAuthError::Fault(err.into())
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claims carried by a signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Audience: the client identifier.
    pub aud: String,
    /// JWT ID: the token identifier.
    pub jti: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Not before (Unix seconds).
    pub nbf: i64,
    /// Expiration (Unix seconds).
    pub exp: i64,
    /// Subject: the resource owner, absent for client-only tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Granted scope identifiers.
    pub scopes: Vec<String>,
}

impl AccessTokenClaims {
    /// Builds the claim set for `token` as of `now`.
    #[must_use]
    pub fn for_token(token: &AccessToken, now: OffsetDateTime) -> Self {
        let now = now.unix_timestamp();
        Self {
            aud: token.client.identifier.clone(),
            jti: token.identifier.clone(),
            iat: now,
            nbf: now,
            exp: token.expires_at.unix_timestamp(),
            sub: token.user_identifier.clone(),
            scopes: token.scope_identifiers(),
        }
    }
}

// ============================================================================
// Signing
// ============================================================================

/// Signs `token` with the RSA key behind `private_key`.
///
/// The key is read from disk on every call. Encrypted PKCS#8 keys are
/// decrypted with the key's passphrase.
pub fn sign_access_token(token: &AccessToken, private_key: &CryptKey) -> Result<String, JwtError> {
    let pem = private_key.read_pem()?;
    let encoding_key = encoding_key_from_pem(&pem, private_key.pass_phrase())?;

    let claims = AccessTokenClaims::for_token(token, OffsetDateTime::now_utc());

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| JwtError::encoding_error(e.to_string()))
}

fn encoding_key_from_pem(pem: &str, pass_phrase: Option<&str>) -> Result<EncodingKey, JwtError> {
    match pass_phrase {
        Some(pass_phrase) if pem.contains("ENCRYPTED PRIVATE KEY") => {
            let private_key = RsaPrivateKey::from_pkcs8_encrypted_pem(pem, pass_phrase)
                .map_err(|e| JwtError::invalid_key(e.to_string()))?;
            let private_pem = private_key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| JwtError::invalid_key(e.to_string()))?;
            EncodingKey::from_rsa_pem(private_pem.as_bytes())
                .map_err(|e| JwtError::invalid_key(e.to_string()))
        }
        _ => EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string())),
    }
}
