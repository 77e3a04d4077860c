//! Refresh token repository trait.

use async_trait::async_trait;

use crate::OAuthResult;
use crate::types::{AccessToken, RefreshToken};

/// Persistence of issued refresh tokens.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Creates a new, unpersisted refresh token for `access_token`.
    ///
    /// Returning `None` tells the grant not to issue a refresh token.
    fn get_new_refresh_token(&self, access_token: &AccessToken) -> Option<RefreshToken> {
        Some(RefreshToken::new(access_token.clone()))
    }

    /// Persists a newly issued refresh token.
    ///
    /// # Errors
    ///
    /// Returns `Fault::UniqueTokenIdentifier` if the identifier is taken.
    async fn persist_new_refresh_token(&self, token: &RefreshToken) -> OAuthResult<()>;

    /// Revokes a refresh token.
    async fn revoke_refresh_token(&self, token_id: &str) -> OAuthResult<()>;

    /// Returns `true` if the refresh token has been revoked.
    async fn is_refresh_token_revoked(&self, token_id: &str) -> OAuthResult<bool>;
}
