//! Implicit grant (RFC 6749 §4.2).
//!
//! Authorization endpoint only. The access token is returned directly in the
//! redirect, by default in the URI fragment. No refresh tokens are issued and
//! the token endpoint is never involved.

use std::sync::Arc;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use super::{GrantConfig, GrantType};
use crate::OAuthResult;
use crate::error::{OAuthError, ProtocolError};
use crate::events::RequestEvent;
use crate::http::OAuthRequest;
use crate::oauth::{AuthorizationRequest, AuthorizationRequestFactory, make_redirect_uri};
use crate::response_type::{RedirectResponse, ResponseType};
use crate::storage::RefreshTokenRepository;

/// The `implicit` grant.
#[derive(Debug, Clone)]
pub struct ImplicitGrant {
    config: GrantConfig,
    access_token_ttl: Duration,
    query_delimiter: char,
}

impl ImplicitGrant {
    /// Creates the grant, returning tokens in the URI fragment.
    #[must_use]
    pub fn new(access_token_ttl: Duration) -> Self {
        Self::with_query_delimiter(access_token_ttl, '#')
    }

    /// Creates the grant with a custom delimiter (`#` or `?`).
    #[must_use]
    pub fn with_query_delimiter(access_token_ttl: Duration, query_delimiter: char) -> Self {
        Self {
            config: GrantConfig::default(),
            access_token_ttl,
            query_delimiter,
        }
    }

    /// Lifetime of issued access tokens.
    #[must_use]
    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    /// Delimiter between the redirect URI and the token parameters.
    #[must_use]
    pub fn query_delimiter(&self) -> char {
        self.query_delimiter
    }
}

#[async_trait]
impl GrantType for ImplicitGrant {
    fn identifier(&self) -> &'static str {
        "implicit"
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
            "The Implicit Grant does not return refresh tokens",
        ))
    }

    fn set_refresh_token_ttl(&mut self, _ttl: Duration) -> OAuthResult<()> {
        Err(OAuthError::logic(
            "The Implicit Grant does not return refresh tokens",
        ))
    }

    fn can_respond_to_access_token_request(&self, _request: &dyn OAuthRequest) -> bool {
        false
    }

    async fn respond_to_access_token_request(
        &self,
        _request: &dyn OAuthRequest,
        _response_type: &mut dyn ResponseType,
        _access_token_ttl: Duration,
    ) -> OAuthResult<()> {
        Err(OAuthError::logic(
            "The Implicit Grant does not respond to access token requests",
        ))
    }

    fn can_respond_to_authorization_request(&self, request: &dyn OAuthRequest) -> bool {
        request.has_query_param("client_id") && request.query_param("response_type") == Some("token")
    }

    async fn validate_authorization_request(
        &self,
        request: &dyn OAuthRequest,
    ) -> OAuthResult<AuthorizationRequest> {
        let client_id = request
            .query_param("client_id")
            .map(str::to_string)
            .or_else(|| request.basic_auth_user())
            .ok_or_else(|| ProtocolError::invalid_request("client_id", None))?;

        let client = self
            .config
            .client_repository()?
            .get_client_entity(&client_id, self.identifier(), None, false)
            .await?;

        let Some(client) = client else {
            tracing::warn!(client_id = %client_id, "Unknown client on implicit authorization");
            self.config
                .emit(RequestEvent::ClientAuthenticationFailed, request);
            return Err(ProtocolError::invalid_client().into());
        };

        AuthorizationRequestFactory
            .create_authorization_request(
                self,
                client,
                request,
                request.query_param("redirect_uri"),
                request.query_param("state"),
                true,
            )
            .await
    }

    async fn complete_authorization_request(
        &self,
        authorization_request: AuthorizationRequest,
    ) -> OAuthResult<RedirectResponse> {
        let Some(user) = authorization_request.user() else {
            return Err(OAuthError::logic(
                "A user should be set on the AuthorizationRequest",
            ));
        };

        let (client, final_redirect_uri) = self
            .config
            .verify_authorization_request(&authorization_request)
            .await?;
        let final_redirect_uri = final_redirect_uri.as_str();

        if !authorization_request.is_authorization_approved() {
            tracing::debug!(
                client_id = %authorization_request.client().identifier,
                "Resource owner denied implicit authorization"
            );
            return Err(ProtocolError::access_denied(
                Some("The user denied the request"),
                Some(make_redirect_uri(
                    final_redirect_uri,
                    &[("state", authorization_request.state())],
                    '?',
                )),
            )
            .into());
        }

        let access_token = self
            .config
            .issue_access_token(
                self.access_token_ttl,
                &client,
                Some(user.identifier()),
                authorization_request.scopes(),
            )
            .await?;

        let jwt = access_token.convert_to_jwt(self.config.private_key()?)?;
        let expires_in =
            (access_token.expires_at - OffsetDateTime::now_utc()).whole_seconds().to_string();

        tracing::debug!(
            client_id = %client.identifier,
            user_id = %user.identifier,
            "Issued implicit access token"
        );

        Ok(RedirectResponse::new(make_redirect_uri(
            final_redirect_uri,
            &[
                ("access_token", Some(jwt.as_str())),
                ("token_type", Some("Bearer")),
                ("expires_in", Some(expires_in.as_str())),
                ("state", authorization_request.state()),
            ],
            self.query_delimiter,
        )))
    }
}
