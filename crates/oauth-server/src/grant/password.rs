//! Resource owner password credentials grant (RFC 6749 §4.3).

use std::sync::Arc;

use async_trait::async_trait;
use time::Duration;

use super::{GrantConfig, GrantType};
use crate::OAuthResult;
use crate::error::ProtocolError;
use crate::events::RequestEvent;
use crate::http::OAuthRequest;
use crate::oauth::ScopeSource;
use crate::response_type::ResponseType;
use crate::storage::{RefreshTokenRepository, UserRepository};
use crate::types::{Client, User};

/// The `password` grant.
#[derive(Debug, Clone)]
pub struct PasswordGrant {
    config: GrantConfig,
}

impl PasswordGrant {
    /// Creates the grant.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        refresh_token_repository: Arc<dyn RefreshTokenRepository>,
    ) -> Self {
        let mut config = GrantConfig::default();
        config.user_repository = Some(user_repository);
        config.refresh_token_repository = Some(refresh_token_repository);
        Self { config }
    }

    async fn validate_user(&self, request: &dyn OAuthRequest, client: &Client) -> OAuthResult<User> {
        let username = request
            .body_param("username")
            .ok_or_else(|| ProtocolError::invalid_request("username", None))?;
        let password = request
            .body_param("password")
            .ok_or_else(|| ProtocolError::invalid_request("password", None))?;

        let user = self
            .config
            .user_repository()?
            .get_user_entity_by_user_credentials(username, password, self.identifier(), client)
            .await?;

        user.ok_or_else(|| {
            tracing::warn!(client_id = %client.identifier, "Resource owner credentials rejected");
            self.config
                .emit(RequestEvent::UserAuthenticationFailed, request);
            ProtocolError::invalid_credentials().into()
        })
    }
}

#[async_trait]
impl GrantType for PasswordGrant {
    fn identifier(&self) -> &'static str {
        "password"
    }

    fn config(&self) -> &GrantConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut GrantConfig {
        &mut self.config
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

        let user = self.validate_user(request, &client).await?;

        let scopes = scope_resolver
            .finalize(scopes, self.identifier(), &client, Some(user.identifier()))
            .await?;

        self.config
            .issue_token_pair(
                request,
                response_type,
                access_token_ttl,
                &client,
                Some(user.identifier()),
                &scopes,
            )
            .await
    }
}
