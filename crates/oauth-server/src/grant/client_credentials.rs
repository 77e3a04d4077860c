//! Client credentials grant (RFC 6749 §4.4).
//!
//! Token endpoint only. The client acts on its own behalf, so issued tokens
//! carry no user and no refresh token is ever issued.

use std::sync::Arc;

use async_trait::async_trait;
use time::Duration;

use super::{GrantConfig, GrantType};
use crate::OAuthResult;
use crate::error::OAuthError;
use crate::events::RequestEvent;
use crate::http::OAuthRequest;
use crate::oauth::ScopeSource;
use crate::response_type::ResponseType;
use crate::storage::RefreshTokenRepository;

/// The `client_credentials` grant.
#[derive(Debug, Clone, Default)]
pub struct ClientCredentialsGrant {
    config: GrantConfig,
}

impl ClientCredentialsGrant {
    /// Creates the grant.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantType for ClientCredentialsGrant {
    fn identifier(&self) -> &'static str {
        "client_credentials"
    }

    fn config(&self) -> &GrantConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut GrantConfig {
        &mut self.config
    }

    fn set_refresh_token_repository(
        &mut self,
        _repository: Arc<dyn RefreshTokenRepository>,
    ) -> OAuthResult<()> {
        Err(OAuthError::logic(
            "The Client Credentials Grant does not return refresh tokens",
        ))
    }

    fn set_refresh_token_ttl(&mut self, _ttl: Duration) -> OAuthResult<()> {
        Err(OAuthError::logic(
            "The Client Credentials Grant does not return refresh tokens",
        ))
    }

    async fn respond_to_access_token_request(
        &self,
        request: &dyn OAuthRequest,
        response_type: &mut dyn ResponseType,
        access_token_ttl: Duration,
    ) -> OAuthResult<()> {
        let client = self.config.validate_client(self.identifier(), request).await?;

        let scope_resolver = self.config.scope_resolver()?;
        let scopes = scope_resolver
            .resolve(request, ScopeSource::Body, None)
            .await?;
        let scopes = scope_resolver
            .finalize(scopes, self.identifier(), &client, None)
            .await?;

        let access_token = self
            .config
            .issue_access_token(access_token_ttl, &client, None, &scopes)
            .await?;

        tracing::debug!(
            client_id = %client.identifier,
            scopes = scopes.len(),
            "Issued client credentials access token"
        );
        self.config.emit(RequestEvent::AccessTokenIssued, request);

        response_type.set_access_token(access_token);
        Ok(())
    }
}
