//! Token entities issued by grants.

use time::OffsetDateTime;

use super::{Client, Scope};
use crate::crypto::CryptKey;
use crate::token::jwt::{self, JwtError};

// =============================================================================
// Access Token
// =============================================================================

/// An issued access token.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    /// Token identifier (`jti`).
    pub identifier: String,
    /// Client the token was issued to.
    pub client: Client,
    /// Resource owner, absent for client-only tokens.
    pub user_identifier: Option<String>,
    /// Granted scopes.
    pub scopes: Vec<Scope>,
    /// Expiry instant.
    pub expires_at: OffsetDateTime,
}

impl AccessToken {
    /// Creates an unpersisted token with an empty identifier.
    ///
    /// The issuing grant assigns the identifier and expiry.
    #[must_use]
    pub fn new(client: Client, scopes: Vec<Scope>, user_identifier: Option<String>) -> Self {
        Self {
            identifier: String::new(),
            client,
            user_identifier,
            scopes,
            expires_at: OffsetDateTime::now_utc(),
        }
    }

    /// Identifiers of the granted scopes, in order.
    #[must_use]
    pub fn scope_identifiers(&self) -> Vec<String> {
        self.scopes.iter().map(|s| s.identifier.clone()).collect()
    }

    /// Signs the token as an RS256 JWT bearer credential.
    pub fn convert_to_jwt(&self, private_key: &CryptKey) -> Result<String, JwtError> {
        jwt::sign_access_token(self, private_key)
    }
}

// =============================================================================
// Refresh Token
// =============================================================================

/// An issued refresh token, bound to the access token it was issued with.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshToken {
    /// Token identifier.
    pub identifier: String,
    /// Access token issued alongside.
    pub access_token: AccessToken,
    /// Expiry instant.
    pub expires_at: OffsetDateTime,
}

impl RefreshToken {
    /// Creates an unpersisted refresh token for `access_token`.
    #[must_use]
    pub fn new(access_token: AccessToken) -> Self {
        Self {
            identifier: String::new(),
            access_token,
            expires_at: OffsetDateTime::now_utc(),
        }
    }
}

// =============================================================================
// Authorization Code
// =============================================================================

/// An issued authorization code.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthCode {
    /// Code identifier.
    pub identifier: String,
    /// Client the code was issued to.
    pub client: Client,
    /// Resource owner who approved the request.
    pub user_identifier: Option<String>,
    /// Scopes bound to the code.
    pub scopes: Vec<Scope>,
    /// Redirect URI the code was delivered to, when one was supplied.
    pub redirect_uri: Option<String>,
    /// Expiry instant.
    pub expires_at: OffsetDateTime,
}

impl AuthCode {
    /// Creates an unpersisted authorization code.
    #[must_use]
    pub fn new(client: Client, scopes: Vec<Scope>, user_identifier: Option<String>) -> Self {
        Self {
            identifier: String::new(),
            client,
            user_identifier,
            scopes,
            redirect_uri: None,
            expires_at: OffsetDateTime::now_utc(),
        }
    }
}
