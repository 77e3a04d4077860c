//! Authorization code grant (RFC 6749 §4.1) with PKCE (RFC 7636).
//!
//! Authorization endpoint: `response_type=code`. The pending request is
//! built without finalizing scopes; they are finalized with the user once
//! the resource owner approves. The code handed to the client is an
//! encrypted [`AuthCodePayload`].
//!
//! Token endpoint: `grant_type=authorization_code`. The code is decrypted,
//! checked for expiry, revocation, client binding, redirect URI and PKCE,
//! then exchanged for an access and refresh token and revoked.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::{GrantConfig, GrantType};
use crate::OAuthResult;
use crate::error::{OAuthError, ProtocolError};
use crate::events::RequestEvent;
use crate::http::OAuthRequest;
use crate::oauth::pkce::is_valid_code_challenge;
use crate::oauth::{AuthorizationRequest, AuthorizationRequestFactory, make_redirect_uri};
use crate::response_type::{RedirectResponse, ResponseType};
use crate::storage::{AuthCodeRepository, RefreshTokenRepository};
use crate::types::AuthCode;

/// PKCE method assumed when `code_challenge_method` is omitted.
const DEFAULT_CODE_CHALLENGE_METHOD: &str = "plain";

/// Encrypted content of an authorization code handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCodePayload {
    /// Client the code was issued to.
    pub client_id: String,
    /// Redirect URI the code was delivered to.
    pub redirect_uri: Option<String>,
    /// Code identifier.
    pub auth_code_id: String,
    /// Granted scope identifiers.
    pub scopes: Vec<String>,
    /// Resource owner who approved the request.
    pub user_id: String,
    /// Expiry (Unix seconds).
    pub expire_time: i64,
    /// PKCE challenge, if one was sent.
    pub code_challenge: Option<String>,
    /// PKCE method, if a challenge was sent.
    pub code_challenge_method: Option<String>,
}

impl AuthCodePayload {
    fn for_code(code: &AuthCode, user_id: &str, request: &AuthorizationRequest) -> Self {
        Self {
            client_id: code.client.identifier.clone(),
            redirect_uri: code.redirect_uri.clone(),
            auth_code_id: code.identifier.clone(),
            scopes: code.scopes.iter().map(|s| s.identifier.clone()).collect(),
            user_id: user_id.to_string(),
            expire_time: code.expires_at.unix_timestamp(),
            code_challenge: request.code_challenge().map(str::to_string),
            code_challenge_method: request.code_challenge_method().map(str::to_string),
        }
    }
}

/// The `authorization_code` grant.
#[derive(Debug, Clone)]
pub struct AuthCodeGrant {
    config: GrantConfig,
    auth_code_ttl: Duration,
    require_code_challenge_for_public_clients: bool,
}

impl AuthCodeGrant {
    /// Creates the grant.
    #[must_use]
    pub fn new(
        auth_code_repository: Arc<dyn AuthCodeRepository>,
        refresh_token_repository: Arc<dyn RefreshTokenRepository>,
        auth_code_ttl: Duration,
    ) -> Self {
        let mut config = GrantConfig::default();
        config.auth_code_repository = Some(auth_code_repository);
        config.refresh_token_repository = Some(refresh_token_repository);

        Self {
            config,
            auth_code_ttl,
            require_code_challenge_for_public_clients: true,
        }
    }

    /// Allows public clients to omit `code_challenge`.
    pub fn disable_require_code_challenge_for_public_clients(&mut self) {
        self.require_code_challenge_for_public_clients = false;
    }

    /// Whether public clients must send a `code_challenge`.
    #[must_use]
    pub fn requires_code_challenge_for_public_clients(&self) -> bool {
        self.require_code_challenge_for_public_clients
    }

    /// Lifetime of issued codes.
    #[must_use]
    pub fn auth_code_ttl(&self) -> Duration {
        self.auth_code_ttl
    }

    fn supported_methods_hint(&self) -> String {
        let methods = self.config.code_challenge_verifiers().methods();
        format!(
            "Code challenge method must be one of {}",
            methods
                .iter()
                .map(|m| format!("`{}`", m))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn decrypt_code(&self, encrypted: &str) -> OAuthResult<AuthCodePayload> {
        let encryption_key = self.config.encryption_key()?;

        let decrypted = encryption_key.decrypt(encrypted).map_err(|e| {
            tracing::debug!(error = %e, "Authorization code could not be decrypted");
            ProtocolError::invalid_request("code", Some("Cannot decrypt the authorization code"))
        })?;

        serde_json::from_str(&decrypted).map_err(|_| {
            ProtocolError::invalid_request("code", Some("Cannot decrypt the authorization code"))
                .into()
        })
    }

    fn verify_code_verifier(
        &self,
        request: &dyn OAuthRequest,
        payload: &AuthCodePayload,
    ) -> OAuthResult<()> {
        let Some(code_challenge) = payload.code_challenge.as_deref() else {
            return Ok(());
        };

        let code_verifier = request
            .body_param("code_verifier")
            .ok_or_else(|| ProtocolError::invalid_request("code_verifier", None))?;

        if !is_valid_code_challenge(code_verifier) {
            return Err(ProtocolError::invalid_request(
                "code_verifier",
                Some("Code Verifier must follow the specifications of RFC-7636."),
            )
            .into());
        }

        let method = payload
            .code_challenge_method
            .as_deref()
            .unwrap_or(DEFAULT_CODE_CHALLENGE_METHOD);

        let verifier = self
            .config
            .code_challenge_verifiers()
            .get(method)
            .ok_or_else(|| ProtocolError::invalid_grant(Some("Unsupported code challenge method")))?;

        if !verifier.verify_code_challenge(code_verifier, code_challenge) {
            tracing::warn!(
                client_id = %payload.client_id,
                method,
                "PKCE verification failed"
            );
            return Err(
                ProtocolError::invalid_grant(Some("Failed to verify `code_verifier`.")).into(),
            );
        }

        Ok(())
    }
}

#[async_trait]
impl GrantType for AuthCodeGrant {
    fn identifier(&self) -> &'static str {
        "authorization_code"
    }

    fn config(&self) -> &GrantConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut GrantConfig {
        &mut self.config
    }

    // -------------------------------------------------------------------------
    // Token Endpoint
    // -------------------------------------------------------------------------

    async fn respond_to_access_token_request(
        &self,
        request: &dyn OAuthRequest,
        response_type: &mut dyn ResponseType,
        access_token_ttl: Duration,
    ) -> OAuthResult<()> {
        let client = self.config.validate_client(self.identifier(), request).await?;

        let encrypted = request
            .body_param("code")
            .ok_or_else(|| ProtocolError::invalid_request("code", None))?;
        let payload = self.decrypt_code(encrypted)?;

        if payload.expire_time < OffsetDateTime::now_utc().unix_timestamp() {
            return Err(
                ProtocolError::invalid_request("code", Some("Authorization code has expired"))
                    .into(),
            );
        }

        if self
            .config
            .auth_code_repository()?
            .is_auth_code_revoked(&payload.auth_code_id)
            .await?
        {
            tracing::warn!(client_id = %client.identifier, "Revoked authorization code presented");
            return Err(ProtocolError::invalid_request(
                "code",
                Some("Authorization code has been revoked"),
            )
            .into());
        }

        if payload.client_id != client.identifier {
            return Err(ProtocolError::invalid_request(
                "code",
                Some("Authorization code was not issued to this client"),
            )
            .into());
        }

        match (request.body_param("redirect_uri"), payload.redirect_uri.as_deref()) {
            (Some(supplied), expected) if Some(supplied) != expected => {
                self.config
                    .emit(RequestEvent::ClientAuthenticationFailed, request);
                return Err(ProtocolError::invalid_client().into());
            }
            (None, Some(expected)) if client.single_redirect_uri() != Some(expected) => {
                return Err(ProtocolError::invalid_request("redirect_uri", None).into());
            }
            _ => {}
        }

        self.verify_code_verifier(request, &payload)?;

        let scope_resolver = self.config.scope_resolver()?;
        let scopes = scope_resolver.validate_scopes(&payload.scopes, None).await?;
        let scopes = scope_resolver
            .finalize(scopes, self.identifier(), &client, Some(&payload.user_id))
            .await?;

        self.config
            .issue_token_pair(
                request,
                response_type,
                access_token_ttl,
                &client,
                Some(&payload.user_id),
                &scopes,
            )
            .await?;

        self.config
            .auth_code_repository()?
            .revoke_auth_code(&payload.auth_code_id)
            .await?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Authorization Endpoint
    // -------------------------------------------------------------------------

    fn can_respond_to_authorization_request(&self, request: &dyn OAuthRequest) -> bool {
        request.has_query_param("client_id") && request.query_param("response_type") == Some("code")
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
            tracing::warn!(client_id = %client_id, "Unknown client on code authorization");
            self.config
                .emit(RequestEvent::ClientAuthenticationFailed, request);
            return Err(ProtocolError::invalid_client().into());
        };

        let is_confidential = client.is_confidential();

        let mut authorization_request = AuthorizationRequestFactory
            .create_authorization_request(
                self,
                client,
                request,
                request.query_param("redirect_uri"),
                request.query_param("state"),
                false,
            )
            .await?;

        match request.query_param("code_challenge") {
            Some(code_challenge) => {
                let method = request
                    .query_param("code_challenge_method")
                    .unwrap_or(DEFAULT_CODE_CHALLENGE_METHOD);

                if !self.config.code_challenge_verifiers().supports(method) {
                    return Err(ProtocolError::invalid_request(
                        "code_challenge_method",
                        Some(self.supported_methods_hint().as_str()),
                    )
                    .into());
                }

                if !is_valid_code_challenge(code_challenge) {
                    return Err(ProtocolError::invalid_request(
                        "code_challenge",
                        Some("Code challenge must follow the specifications of RFC-7636."),
                    )
                    .into());
                }

                authorization_request.set_code_challenge(code_challenge);
                authorization_request.set_code_challenge_method(method);
            }
            None if self.require_code_challenge_for_public_clients && !is_confidential => {
                return Err(ProtocolError::invalid_request(
                    "code_challenge",
                    Some("Code challenge must be provided for public clients"),
                )
                .into());
            }
            None => {}
        }

        Ok(authorization_request)
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

        let client = &client;
        let scopes = self
            .config
            .scope_resolver()?
            .finalize(
                authorization_request.scopes().to_vec(),
                self.identifier(),
                client,
                Some(user.identifier()),
            )
            .await?;

        let auth_code = self
            .config
            .issue_auth_code(
                self.auth_code_ttl,
                client,
                user.identifier(),
                authorization_request.redirect_uri(),
                &scopes,
            )
            .await?;

        let payload = AuthCodePayload::for_code(&auth_code, user.identifier(), &authorization_request);
        let payload =
            serde_json::to_string(&payload).map_err(|e| OAuthError::crypto(e.to_string()))?;
        let code = self.config.encryption_key()?.encrypt(&payload)?;

        tracing::debug!(
            client_id = %client.identifier,
            user_id = %user.identifier,
            "Issued authorization code"
        );

        Ok(RedirectResponse::new(make_redirect_uri(
            final_redirect_uri,
            &[
                ("code", Some(code.as_str())),
                ("state", authorization_request.state()),
            ],
            '?',
        )))
    }
}
