//! Access token repository trait.

use async_trait::async_trait;

use crate::OAuthResult;
use crate::types::{AccessToken, Client, Scope};

/// Persistence of issued access tokens.
#[async_trait]
pub trait AccessTokenRepository: Send + Sync {
    /// Creates a new, unpersisted access token.
    ///
    /// The grant fills in the identifier and expiry afterwards.
    fn get_new_token(
        &self,
        client: &Client,
        scopes: &[Scope],
        user_identifier: Option<&str>,
    ) -> AccessToken {
        AccessToken::new(
            client.clone(),
            scopes.to_vec(),
            user_identifier.map(str::to_string),
        )
    }

    /// Persists a newly issued access token.
    ///
    /// # Errors
    ///
    /// Returns `Fault::UniqueTokenIdentifier` if the identifier is taken.
    async fn persist_new_access_token(&self, token: &AccessToken) -> OAuthResult<()>;

    /// Revokes an access token.
    async fn revoke_access_token(&self, token_id: &str) -> OAuthResult<()>;

    /// Returns `true` if the access token has been revoked.
    async fn is_access_token_revoked(&self, token_id: &str) -> OAuthResult<bool>;
}
