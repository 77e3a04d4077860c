//! Refresh token grant (RFC 6749 §6).
//!
//! Exchanges an encrypted [`RefreshTokenPayload`] for a new access token and
//! refresh token. The presented pair is revoked, so every refresh token is
//! single-use. Requested scopes may narrow the original grant but never
//! widen it.

use std::sync::Arc;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use super::{GrantConfig, GrantType};
use crate::OAuthResult;
use crate::error::ProtocolError;
use crate::events::RequestEvent;
use crate::http::OAuthRequest;
use crate::oauth::split_scopes;
use crate::response_type::{RefreshTokenPayload, ResponseType};
use crate::storage::RefreshTokenRepository;
use crate::types::Client;

/// The `refresh_token` grant.
#[derive(Debug, Clone)]
pub struct RefreshTokenGrant {
    config: GrantConfig,
}

impl RefreshTokenGrant {
    /// Creates the grant.
    #[must_use]
    pub fn new(refresh_token_repository: Arc<dyn RefreshTokenRepository>) -> Self {
        let mut config = GrantConfig::default();
        config.refresh_token_repository = Some(refresh_token_repository);
        Self { config }
    }

    async fn validate_old_refresh_token(
        &self,
        request: &dyn OAuthRequest,
        client: &Client,
    ) -> OAuthResult<RefreshTokenPayload> {
        let encrypted = request
            .body_param("refresh_token")
            .ok_or_else(|| ProtocolError::invalid_request("refresh_token", None))?;

        let payload = self
            .config
            .encryption_key()?
            .decrypt(encrypted)
            .ok()
            .and_then(|decrypted| serde_json::from_str::<RefreshTokenPayload>(&decrypted).ok())
            .ok_or_else(|| {
                ProtocolError::invalid_refresh_token(Some("Cannot decrypt the refresh token"))
            })?;

        if payload.client_id != client.identifier {
            tracing::warn!(
                client_id = %client.identifier,
                token_client_id = %payload.client_id,
                "Refresh token presented by another client"
            );
            self.config
                .emit(RequestEvent::RefreshTokenClientFailed, request);
            return Err(
                ProtocolError::invalid_refresh_token(Some("Token is not linked to client")).into(),
            );
        }

        if payload.expire_time < OffsetDateTime::now_utc().unix_timestamp() {
            return Err(ProtocolError::invalid_refresh_token(Some("Token has expired")).into());
        }

        if self
            .config
            .refresh_token_repository()?
            .is_refresh_token_revoked(&payload.refresh_token_id)
            .await?
        {
            return Err(ProtocolError::invalid_refresh_token(Some("Token has been revoked")).into());
        }

        Ok(payload)
    }
}

#[async_trait]
impl GrantType for RefreshTokenGrant {
    fn identifier(&self) -> &'static str {
        "refresh_token"
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
        let old_token = self.validate_old_refresh_token(request, &client).await?;

        let requested = request
            .body_param("scope")
            .map(split_scopes)
            .unwrap_or_default();

        let scope_resolver = self.config.scope_resolver()?;
        let scopes = if requested.is_empty() {
            scope_resolver.validate_scopes(&old_token.scopes, None).await?
        } else {
            // Narrowing only.
            if let Some(widened) = requested.iter().find(|s| !old_token.scopes.contains(*s)) {
                return Err(ProtocolError::invalid_scope(widened, None).into());
            }
            scope_resolver.validate_scopes(&requested, None).await?
        };

        self.config
            .access_token_repository()?
            .revoke_access_token(&old_token.access_token_id)
            .await?;
        self.config
            .refresh_token_repository()?
            .revoke_refresh_token(&old_token.refresh_token_id)
            .await?;

        tracing::debug!(
            client_id = %client.identifier,
            refresh_token_id = %old_token.refresh_token_id,
            "Rotating refresh token"
        );

        self.config
            .issue_token_pair(
                request,
                response_type,
                access_token_ttl,
                &client,
                old_token.user_id.as_deref(),
                &scopes,
            )
            .await
    }
}
