//! Authorization server.
//!
//! Owns the enabled grants and dispatches incoming requests to them.
//!
//! # Usage
//!
//! ```ignore
//! use oauth_server::prelude::*;
//!
//! let mut server = AuthorizationServer::new(
//!     client_repository,
//!     access_token_repository,
//!     scope_repository,
//!     private_key,
//!     Some(encryption_key),
//! );
//! server.enable_grant_type(ClientCredentialsGrant::new(), None);
//!
//! let response = server.respond_to_access_token_request(&request).await?;
//! ```

use std::sync::Arc;

use axum::response::Response;
use indexmap::IndexMap;
use time::Duration;

use crate::OAuthResult;
use crate::config::OAuthServerConfig;
use crate::crypto::{CryptKey, EncryptionKey};
use crate::error::ProtocolError;
use crate::events::{EventEmitter, TracingEventEmitter};
use crate::grant::GrantType;
use crate::http::OAuthRequest;
use crate::oauth::AuthorizationRequest;
use crate::response_type::{BearerTokenResponse, RedirectResponse, ResponseType};
use crate::storage::{AccessTokenRepository, ClientRepository, ScopeRepository};

/// Access token lifetime used when a grant is enabled without one.
const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::hours(1);

/// A grant frozen behind `Arc` with its access token lifetime.
struct EnabledGrant {
    grant: Arc<dyn GrantType>,
    access_token_ttl: Duration,
}

/// OAuth 2.0 authorization server.
///
/// Grants are configured once through [`enable_grant_type`](Self::enable_grant_type)
/// and are then shared read-only by every request.
pub struct AuthorizationServer {
    client_repository: Arc<dyn ClientRepository>,
    access_token_repository: Arc<dyn AccessTokenRepository>,
    scope_repository: Arc<dyn ScopeRepository>,
    private_key: Arc<CryptKey>,
    encryption_key: Option<EncryptionKey>,
    default_scope: Option<String>,
    default_access_token_ttl: Duration,
    emitter: Arc<dyn EventEmitter>,

    /// Enabled grants keyed by identifier, in the order they were enabled.
    grants: IndexMap<&'static str, EnabledGrant>,
}

impl AuthorizationServer {
    /// Creates a server with no grants enabled.
    #[must_use]
    pub fn new(
        client_repository: Arc<dyn ClientRepository>,
        access_token_repository: Arc<dyn AccessTokenRepository>,
        scope_repository: Arc<dyn ScopeRepository>,
        private_key: Arc<CryptKey>,
        encryption_key: Option<EncryptionKey>,
    ) -> Self {
        Self {
            client_repository,
            access_token_repository,
            scope_repository,
            private_key,
            encryption_key,
            default_scope: None,
            default_access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            emitter: Arc::new(TracingEventEmitter),
            grants: IndexMap::new(),
        }
    }

    /// Creates a server from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration fault if validation fails or the keys cannot
    /// be loaded.
    pub fn from_config(
        config: &OAuthServerConfig,
        client_repository: Arc<dyn ClientRepository>,
        access_token_repository: Arc<dyn AccessTokenRepository>,
        scope_repository: Arc<dyn ScopeRepository>,
    ) -> OAuthResult<Self> {
        config.validate()?;

        let mut server = Self::new(
            client_repository,
            access_token_repository,
            scope_repository,
            config.load_private_key()?,
            config.load_encryption_key()?,
        );
        server.default_scope = config.default_scope.clone();
        server.default_access_token_ttl = config.access_token_ttl();

        Ok(server)
    }

    /// Sets the scope granted when a request names none.
    ///
    /// Applies to grants enabled afterwards.
    pub fn set_default_scope(&mut self, scope: impl Into<String>) {
        self.default_scope = Some(scope.into());
    }

    /// Sets the event emitter.
    ///
    /// Applies to grants enabled afterwards.
    pub fn set_emitter(&mut self, emitter: Arc<dyn EventEmitter>) {
        self.emitter = emitter;
    }

    /// Configures `grant` with the server's repositories, keys, default scope
    /// and emitter, then enables it.
    ///
    /// Enabling a grant with an identifier that is already enabled replaces
    /// the previous one.
    pub fn enable_grant_type<G>(&mut self, mut grant: G, access_token_ttl: Option<Duration>)
    where
        G: GrantType + 'static,
    {
        grant.set_client_repository(Arc::clone(&self.client_repository));
        grant.set_access_token_repository(Arc::clone(&self.access_token_repository));
        grant.set_scope_repository(Arc::clone(&self.scope_repository));
        grant.set_private_key(Arc::clone(&self.private_key));
        if let Some(key) = &self.encryption_key {
            grant.set_encryption_key(key.clone());
        }
        if let Some(scope) = &self.default_scope {
            grant.set_default_scope(scope.clone());
        }
        grant.set_emitter(Arc::clone(&self.emitter));

        let identifier = grant.identifier();
        let access_token_ttl = access_token_ttl.unwrap_or(self.default_access_token_ttl);

        tracing::debug!(grant_type = identifier, %access_token_ttl, "Enabled grant type");

        self.grants.insert(
            identifier,
            EnabledGrant {
                grant: Arc::new(grant),
                access_token_ttl,
            },
        );
    }

    /// Identifiers of the enabled grants, in enabling order.
    #[must_use]
    pub fn enabled_grant_types(&self) -> Vec<&'static str> {
        self.grants.keys().copied().collect()
    }

    /// Returns the enabled grant with `identifier`.
    #[must_use]
    pub fn grant(&self, identifier: &str) -> Option<&Arc<dyn GrantType>> {
        self.grants.get(identifier).map(|enabled| &enabled.grant)
    }

    // -------------------------------------------------------------------------
    // Authorization Endpoint
    // -------------------------------------------------------------------------

    /// Validates an authorization request with the first grant that handles it.
    ///
    /// # Errors
    ///
    /// Returns `unsupported_grant_type` if no enabled grant handles it.
    pub async fn validate_authorization_request(
        &self,
        request: &dyn OAuthRequest,
    ) -> OAuthResult<AuthorizationRequest> {
        let Some(enabled) = self
            .grants
            .values()
            .find(|enabled| enabled.grant.can_respond_to_authorization_request(request))
        else {
            tracing::debug!("No grant handles the authorization request");
            return Err(ProtocolError::unsupported_grant_type().into());
        };

        tracing::debug!(
            grant_type = enabled.grant.identifier(),
            "Dispatching authorization request"
        );
        enabled.grant.validate_authorization_request(request).await
    }

    /// Completes an authorization request with the grant that created it.
    ///
    /// # Errors
    ///
    /// Returns `unsupported_grant_type` if that grant is no longer enabled.
    pub async fn complete_authorization_request(
        &self,
        authorization_request: AuthorizationRequest,
    ) -> OAuthResult<RedirectResponse> {
        let Some(enabled) = self.grants.get(authorization_request.grant_type_id()) else {
            return Err(ProtocolError::unsupported_grant_type().into());
        };

        enabled
            .grant
            .complete_authorization_request(authorization_request)
            .await
    }

    // -------------------------------------------------------------------------
    // Token Endpoint
    // -------------------------------------------------------------------------

    /// Handles a token request with the first grant that accepts it.
    ///
    /// # Errors
    ///
    /// Returns `unsupported_grant_type` if no enabled grant accepts it, or
    /// whatever the grant reports. Render failures with
    /// [`into_response_for`](crate::error::OAuthError::into_response_for)
    /// and the request's `Authorization` header; plain `?` into an axum
    /// handler always challenges with `Basic`.
    pub async fn respond_to_access_token_request(
        &self,
        request: &dyn OAuthRequest,
    ) -> OAuthResult<Response> {
        let Some(enabled) = self
            .grants
            .values()
            .find(|enabled| enabled.grant.can_respond_to_access_token_request(request))
        else {
            tracing::debug!(
                grant_type = request.body_param("grant_type"),
                "No grant handles the token request"
            );
            return Err(ProtocolError::unsupported_grant_type().into());
        };

        tracing::debug!(
            grant_type = enabled.grant.identifier(),
            "Dispatching token request"
        );

        let mut response =
            BearerTokenResponse::new(Arc::clone(&self.private_key), self.encryption_key.clone());
        enabled
            .grant
            .respond_to_access_token_request(request, &mut response, enabled.access_token_ttl)
            .await?;

        response.generate_http_response()
    }
}

impl std::fmt::Debug for AuthorizationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationServer")
            .field("grants", &self.enabled_grant_types())
            .field("default_scope", &self.default_scope)
            .field("default_access_token_ttl", &self.default_access_token_ttl)
            .finish_non_exhaustive()
    }
}
