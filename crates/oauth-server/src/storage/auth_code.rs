//! Authorization code repository trait.

use async_trait::async_trait;

use crate::OAuthResult;
use crate::types::{AuthCode, Client, Scope};

/// Persistence of issued authorization codes.
///
/// Codes are single use: a successful exchange revokes the code, and a
/// revoked code must never be accepted again.
#[async_trait]
pub trait AuthCodeRepository: Send + Sync {
    /// Creates a new, unpersisted authorization code.
    fn get_new_auth_code(
        &self,
        client: &Client,
        scopes: &[Scope],
        user_identifier: Option<&str>,
    ) -> AuthCode {
        AuthCode::new(
            client.clone(),
            scopes.to_vec(),
            user_identifier.map(str::to_string),
        )
    }

    /// Persists a newly issued authorization code.
    ///
    /// # Errors
    ///
    /// Returns `Fault::UniqueTokenIdentifier` if the identifier is taken.
    async fn persist_new_auth_code(&self, code: &AuthCode) -> OAuthResult<()>;

    /// Revokes an authorization code.
    async fn revoke_auth_code(&self, code_id: &str) -> OAuthResult<()>;

    /// Returns `true` if the code has been revoked or already used.
    async fn is_auth_code_revoked(&self, code_id: &str) -> OAuthResult<bool>;
}
