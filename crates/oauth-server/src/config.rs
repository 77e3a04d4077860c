//! Authorization server configuration.
//!
//! Token lifetimes, key material and PKCE policy for an
//! [`AuthorizationServer`](crate::AuthorizationServer). Reading the values
//! from files or the environment is left to the host.
//!
//! # Example (TOML)
//!
//! ```toml
//! [oauth]
//! access_token_lifetime = "1h"
//! refresh_token_lifetime = "30d"
//! auth_code_lifetime = "10m"
//! default_scope = "basic"
//! private_key = "/etc/oauth/private.key"
//! encryption_key = "def00000..."
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::OAuthResult;
use crate::crypto::{CryptKey, EncryptionKey};
use crate::error::{Fault, OAuthError};
use crate::grant::{AuthCodeGrant, GrantType, ImplicitGrant, PasswordGrant, RefreshTokenGrant};
use crate::storage::{AuthCodeRepository, RefreshTokenRepository, UserRepository};

/// Authorization server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthServerConfig {
    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Authorization code lifetime.
    /// Codes are exchanged immediately, so keep this short.
    #[serde(with = "humantime_serde")]
    pub auth_code_lifetime: Duration,

    /// Scope granted when a request names none.
    pub default_scope: Option<String>,

    /// RSA private key used to sign access tokens.
    /// Either a filesystem path or inline PEM.
    pub private_key: Option<String>,

    /// Passphrase for an encrypted private key.
    pub private_key_passphrase: Option<String>,

    /// Warn when the key file is readable by others.
    pub key_permissions_check: bool,

    /// 32-byte key (hex or base64) for auth code and refresh token payloads.
    pub encryption_key: Option<String>,

    /// Delimiter placed before implicit grant token parameters (`#` or `?`).
    pub implicit_query_delimiter: char,

    /// Reject code requests from public clients that omit `code_challenge`.
    pub require_code_challenge_for_public_clients: bool,
}

impl Default for OAuthServerConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(3600), // 1 hour
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600), // 30 days
            auth_code_lifetime: Duration::from_secs(600),     // 10 minutes
            default_scope: None,
            private_key: None,
            private_key_passphrase: None,
            key_permissions_check: true,
            encryption_key: None,
            implicit_query_delimiter: '#',
            require_code_challenge_for_public_clients: true,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl From<ConfigError> for OAuthError {
    fn from(err: ConfigError) -> Self {
        OAuthError::Fault(Fault::Configuration {
            message: err.to_string(),
        })
    }
}

fn to_time_duration(duration: Duration) -> time::Duration {
    time::Duration::try_from(duration).unwrap_or(time::Duration::MAX)
}

impl OAuthServerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no private key is configured, and
    /// `ConfigError::InvalidValue` if:
    /// - A lifetime is zero
    /// - The private key, passphrase or default scope is blank
    /// - The encryption key does not decode to 32 bytes
    /// - The implicit delimiter is neither `#` nor `?`
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, lifetime) in [
            ("access_token_lifetime", self.access_token_lifetime),
            ("refresh_token_lifetime", self.refresh_token_lifetime),
            ("auth_code_lifetime", self.auth_code_lifetime),
        ] {
            if lifetime.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{} must be > 0", name)));
            }
        }

        match self.private_key.as_deref() {
            None => return Err(ConfigError::Missing("private_key".to_string())),
            Some(key) if key.trim().is_empty() => {
                return Err(ConfigError::InvalidValue(
                    "private_key cannot be empty".to_string(),
                ));
            }
            Some(_) => {}
        }

        if self
            .private_key_passphrase
            .as_deref()
            .is_some_and(|p| p.is_empty())
        {
            return Err(ConfigError::InvalidValue(
                "private_key_passphrase cannot be empty".to_string(),
            ));
        }

        if self
            .default_scope
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue(
                "default_scope cannot be blank".to_string(),
            ));
        }

        if let Some(key) = &self.encryption_key {
            EncryptionKey::parse(key)
                .map_err(|e| ConfigError::InvalidValue(format!("encryption_key: {}", e)))?;
        }

        if !matches!(self.implicit_query_delimiter, '#' | '?') {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid implicit_query_delimiter: '{}'. Must be '#' or '?'",
                self.implicit_query_delimiter
            )));
        }

        Ok(())
    }

    /// Builds the signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is configured or it cannot be read.
    pub fn load_private_key(&self) -> Result<Arc<CryptKey>, ConfigError> {
        let key = self
            .private_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("private_key".to_string()))?;

        let key = CryptKey::new(
            key,
            self.private_key_passphrase.clone(),
            self.key_permissions_check,
        )
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        Ok(Arc::new(key))
    }

    /// Builds the payload encryption key, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not decode to 32 bytes.
    pub fn load_encryption_key(&self) -> Result<Option<EncryptionKey>, ConfigError> {
        self.encryption_key
            .as_deref()
            .map(|key| {
                EncryptionKey::parse(key)
                    .map_err(|e| ConfigError::InvalidValue(format!("encryption_key: {}", e)))
            })
            .transpose()
    }

    /// Access token lifetime as a [`time::Duration`].
    #[must_use]
    pub fn access_token_ttl(&self) -> time::Duration {
        to_time_duration(self.access_token_lifetime)
    }

    /// Refresh token lifetime as a [`time::Duration`].
    #[must_use]
    pub fn refresh_token_ttl(&self) -> time::Duration {
        to_time_duration(self.refresh_token_lifetime)
    }

    /// Authorization code lifetime as a [`time::Duration`].
    #[must_use]
    pub fn auth_code_ttl(&self) -> time::Duration {
        to_time_duration(self.auth_code_lifetime)
    }

    // -------------------------------------------------------------------------
    // Grant builders
    // -------------------------------------------------------------------------

    /// Implicit grant using the configured access token lifetime and delimiter.
    #[must_use]
    pub fn implicit_grant(&self) -> ImplicitGrant {
        ImplicitGrant::with_query_delimiter(self.access_token_ttl(), self.implicit_query_delimiter)
    }

    /// Authorization code grant with the configured code and refresh token
    /// lifetimes and PKCE policy.
    pub fn auth_code_grant(
        &self,
        auth_code_repository: Arc<dyn AuthCodeRepository>,
        refresh_token_repository: Arc<dyn RefreshTokenRepository>,
    ) -> OAuthResult<AuthCodeGrant> {
        let mut grant =
            AuthCodeGrant::new(auth_code_repository, refresh_token_repository, self.auth_code_ttl());
        grant.set_refresh_token_ttl(self.refresh_token_ttl())?;
        if !self.require_code_challenge_for_public_clients {
            grant.disable_require_code_challenge_for_public_clients();
        }
        Ok(grant)
    }

    /// Password grant with the configured refresh token lifetime.
    pub fn password_grant(
        &self,
        user_repository: Arc<dyn UserRepository>,
        refresh_token_repository: Arc<dyn RefreshTokenRepository>,
    ) -> OAuthResult<PasswordGrant> {
        let mut grant = PasswordGrant::new(user_repository, refresh_token_repository);
        grant.set_refresh_token_ttl(self.refresh_token_ttl())?;
        Ok(grant)
    }

    /// Refresh token grant with the configured refresh token lifetime.
    pub fn refresh_token_grant(
        &self,
        refresh_token_repository: Arc<dyn RefreshTokenRepository>,
    ) -> OAuthResult<RefreshTokenGrant> {
        let mut grant = RefreshTokenGrant::new(refresh_token_repository);
        grant.set_refresh_token_ttl(self.refresh_token_ttl())?;
        Ok(grant)
    }
}
