//! Grant types.
//!
//! Every OAuth 2.0 flow is a [`GrantType`]. A grant decides whether it can
//! handle a request, validates it, issues tokens and, for user-interactive
//! flows, drives the two-phase authorization-endpoint protocol.
//!
//! Shared state (repositories, keys, default scope, event emitter) lives in
//! [`GrantConfig`], which the [`AuthorizationServer`](crate::AuthorizationServer)
//! populates once before a grant is used. After that grants are read-only and
//! can serve concurrent requests.
//!
//! | Grant                 | Token endpoint | Authorization endpoint | Refresh tokens |
//! |-----------------------|----------------|------------------------|----------------|
//! | `client_credentials`  | yes            | no                     | no             |
//! | `implicit`            | no             | `response_type=token`  | no             |
//! | `authorization_code`  | yes            | `response_type=code`   | yes            |
//! | `refresh_token`       | yes            | no                     | yes            |
//! | `password`            | yes            | no                     | yes            |

pub mod auth_code;
pub mod client_credentials;
pub mod implicit;
pub mod password;
pub mod refresh_token;

use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use time::{Duration, OffsetDateTime};

use crate::OAuthResult;
use crate::crypto::{CryptKey, EncryptionKey};
use crate::error::{Fault, OAuthError, ProtocolError};
use crate::events::{EventEmitter, RequestEvent, TracingEventEmitter};
use crate::http::OAuthRequest;
use crate::oauth::{
    AuthorizationRequest, CodeChallengeVerifierRegistry, RedirectUriResolver, ScopeResolver,
};
use crate::response_type::{RedirectResponse, ResponseType};
use crate::storage::{
    AccessTokenRepository, AuthCodeRepository, ClientRepository, RefreshTokenRepository,
    ScopeRepository, UserRepository,
};
use crate::types::{AccessToken, AuthCode, Client, RefreshToken, Scope};

pub use auth_code::{AuthCodeGrant, AuthCodePayload};
pub use client_credentials::ClientCredentialsGrant;
pub use implicit::ImplicitGrant;
pub use password::PasswordGrant;
pub use refresh_token::RefreshTokenGrant;

/// Attempts at persisting a token before an identifier collision is fatal.
pub const MAX_RANDOM_TOKEN_GENERATION_ATTEMPTS: usize = 10;

/// Random bytes per token identifier (hex-encoded to 80 characters).
const TOKEN_IDENTIFIER_BYTES: usize = 40;

/// Default refresh token lifetime.
const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::days(30);

/// Generates a random 80-character hex token identifier.
#[must_use]
pub fn generate_unique_identifier() -> String {
    let mut bytes = [0u8; TOKEN_IDENTIFIER_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_identifier_collision(err: &OAuthError) -> bool {
    matches!(err, OAuthError::Fault(Fault::UniqueTokenIdentifier))
}

fn not_configured(what: &str) -> OAuthError {
    OAuthError::configuration(format!("{} is not configured on this grant", what))
}

// =============================================================================
// Grant Configuration
// =============================================================================

/// Configuration shared by every grant type.
#[derive(Clone)]
pub struct GrantConfig {
    client_repository: Option<Arc<dyn ClientRepository>>,
    scope_repository: Option<Arc<dyn ScopeRepository>>,
    access_token_repository: Option<Arc<dyn AccessTokenRepository>>,
    refresh_token_repository: Option<Arc<dyn RefreshTokenRepository>>,
    auth_code_repository: Option<Arc<dyn AuthCodeRepository>>,
    user_repository: Option<Arc<dyn UserRepository>>,
    private_key: Option<Arc<CryptKey>>,
    encryption_key: Option<EncryptionKey>,
    default_scope: Option<String>,
    refresh_token_ttl: Duration,
    emitter: Arc<dyn EventEmitter>,
    code_challenge_verifiers: CodeChallengeVerifierRegistry,
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            client_repository: None,
            scope_repository: None,
            access_token_repository: None,
            refresh_token_repository: None,
            auth_code_repository: None,
            user_repository: None,
            private_key: None,
            encryption_key: None,
            default_scope: None,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            emitter: Arc::new(TracingEventEmitter),
            code_challenge_verifiers: CodeChallengeVerifierRegistry::default(),
        }
    }
}

impl std::fmt::Debug for GrantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantConfig")
            .field("has_client_repository", &self.client_repository.is_some())
            .field("has_scope_repository", &self.scope_repository.is_some())
            .field("has_private_key", &self.private_key.is_some())
            .field("has_encryption_key", &self.encryption_key.is_some())
            .field("default_scope", &self.default_scope)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("code_challenge_verifiers", &self.code_challenge_verifiers)
            .finish_non_exhaustive()
    }
}

impl GrantConfig {
    /// Client repository.
    pub fn client_repository(&self) -> OAuthResult<&Arc<dyn ClientRepository>> {
        self.client_repository
            .as_ref()
            .ok_or_else(|| not_configured("Client repository"))
    }

    /// Scope repository.
    pub fn scope_repository(&self) -> OAuthResult<&Arc<dyn ScopeRepository>> {
        self.scope_repository
            .as_ref()
            .ok_or_else(|| not_configured("Scope repository"))
    }

    /// Access token repository.
    pub fn access_token_repository(&self) -> OAuthResult<&Arc<dyn AccessTokenRepository>> {
        self.access_token_repository
            .as_ref()
            .ok_or_else(|| not_configured("Access token repository"))
    }

    /// Refresh token repository.
    pub fn refresh_token_repository(&self) -> OAuthResult<&Arc<dyn RefreshTokenRepository>> {
        self.refresh_token_repository
            .as_ref()
            .ok_or_else(|| not_configured("Refresh token repository"))
    }

    /// Authorization code repository.
    pub fn auth_code_repository(&self) -> OAuthResult<&Arc<dyn AuthCodeRepository>> {
        self.auth_code_repository
            .as_ref()
            .ok_or_else(|| not_configured("Auth code repository"))
    }

    /// User repository.
    pub fn user_repository(&self) -> OAuthResult<&Arc<dyn UserRepository>> {
        self.user_repository
            .as_ref()
            .ok_or_else(|| not_configured("User repository"))
    }

    /// Private signing key.
    pub fn private_key(&self) -> OAuthResult<&Arc<CryptKey>> {
        self.private_key
            .as_ref()
            .ok_or_else(|| not_configured("Private key"))
    }

    /// Symmetric encryption key.
    pub fn encryption_key(&self) -> OAuthResult<&EncryptionKey> {
        self.encryption_key
            .as_ref()
            .ok_or_else(|| not_configured("Encryption key"))
    }

    /// Default scope used when a request names none.
    #[must_use]
    pub fn default_scope(&self) -> Option<&str> {
        self.default_scope.as_deref()
    }

    /// Refresh token lifetime.
    #[must_use]
    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    /// Event emitter.
    #[must_use]
    pub fn emitter(&self) -> Arc<dyn EventEmitter> {
        Arc::clone(&self.emitter)
    }

    /// PKCE verifier registry.
    #[must_use]
    pub fn code_challenge_verifiers(&self) -> &CodeChallengeVerifierRegistry {
        &self.code_challenge_verifiers
    }

    /// Scope resolver over the configured repository and default scope.
    pub fn scope_resolver(&self) -> OAuthResult<ScopeResolver> {
        Ok(ScopeResolver::new(
            Arc::clone(self.scope_repository()?),
            self.default_scope.clone(),
        ))
    }

    /// Emits `event` for `request`.
    pub fn emit(&self, event: RequestEvent, request: &dyn OAuthRequest) {
        self.emitter.emit(event, request);
    }

    // -------------------------------------------------------------------------
    // Client Validation
    // -------------------------------------------------------------------------

    /// Authenticates the client of a token request.
    ///
    /// `client_id` and `client_secret` come from the body, falling back to
    /// HTTP Basic credentials. A supplied `redirect_uri` must match the
    /// client's registration.
    pub async fn validate_client(
        &self,
        grant_type: &str,
        request: &dyn OAuthRequest,
    ) -> OAuthResult<Client> {
        let basic = request.basic_auth_credentials();

        let client_id = request
            .body_param("client_id")
            .map(str::to_string)
            .or_else(|| basic.as_ref().map(|(user, _)| user.clone()))
            .ok_or_else(|| ProtocolError::invalid_request("client_id", None))?;

        let client_secret = request
            .body_param("client_secret")
            .map(str::to_string)
            .or_else(|| basic.map(|(_, password)| password));

        let client = self
            .client_repository()?
            .get_client_entity(&client_id, grant_type, client_secret.as_deref(), true)
            .await?;

        let Some(client) = client else {
            tracing::warn!(client_id = %client_id, grant_type, "Client authentication failed");
            self.emit(RequestEvent::ClientAuthenticationFailed, request);
            return Err(ProtocolError::invalid_client().into());
        };

        if let Some(redirect_uri) = request.body_param("redirect_uri") {
            RedirectUriResolver::new(self.emitter()).resolve(
                &client,
                request,
                Some(redirect_uri),
            )?;
        }

        Ok(client)
    }

    /// Checks a pending authorization request against the client's current
    /// registration and returns the registered client with the redirect
    /// target.
    ///
    /// The client embedded in the request is not trusted: it is read again
    /// from the client repository and the redirect URI must be one of its
    /// registered URIs.
    pub async fn verify_authorization_request(
        &self,
        authorization_request: &AuthorizationRequest,
    ) -> OAuthResult<(Client, String)> {
        let client_id = authorization_request.client().identifier();
        let client = self
            .client_repository()?
            .get_client_entity(client_id, authorization_request.grant_type_id(), None, false)
            .await?;

        let Some(client) = client else {
            tracing::warn!(client_id, "Authorization request names an unknown client");
            return Err(ProtocolError::invalid_client().into());
        };

        let redirect_uri = match authorization_request.redirect_uri() {
            Some(uri) => uri,
            None => client
                .first_redirect_uri()
                .ok_or_else(|| OAuthError::logic("The AuthorizationRequest has no redirect URI"))?,
        };

        if !client.redirect_uris.iter().any(|registered| registered == redirect_uri) {
            tracing::warn!(
                client_id,
                redirect_uri,
                "Authorization request redirect URI is not registered"
            );
            return Err(ProtocolError::invalid_client().into());
        }

        let redirect_uri = redirect_uri.to_string();
        Ok((client, redirect_uri))
    }

    // -------------------------------------------------------------------------
    // Issuance
    // -------------------------------------------------------------------------

    /// Issues and persists an access token.
    ///
    /// Identifier collisions are retried with a fresh identifier up to
    /// [`MAX_RANDOM_TOKEN_GENERATION_ATTEMPTS`] times.
    pub async fn issue_access_token(
        &self,
        ttl: Duration,
        client: &Client,
        user_identifier: Option<&str>,
        scopes: &[Scope],
    ) -> OAuthResult<AccessToken> {
        let repository = self.access_token_repository()?;

        let mut token = repository.get_new_token(client, scopes, user_identifier);
        token.expires_at = OffsetDateTime::now_utc() + ttl;

        let mut attempt = 1;
        loop {
            token.identifier = generate_unique_identifier();
            match repository.persist_new_access_token(&token).await {
                Ok(()) => return Ok(token),
                Err(e) if is_identifier_collision(&e)
                    && attempt < MAX_RANDOM_TOKEN_GENERATION_ATTEMPTS =>
                {
                    tracing::debug!(attempt, "Access token identifier collision, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Issues and persists a refresh token bound to `access_token`.
    ///
    /// Returns `None` when the repository declines to issue one.
    pub async fn issue_refresh_token(
        &self,
        access_token: &AccessToken,
    ) -> OAuthResult<Option<RefreshToken>> {
        let repository = self.refresh_token_repository()?;

        let Some(mut token) = repository.get_new_refresh_token(access_token) else {
            return Ok(None);
        };
        token.expires_at = OffsetDateTime::now_utc() + self.refresh_token_ttl;

        let mut attempt = 1;
        loop {
            token.identifier = generate_unique_identifier();
            match repository.persist_new_refresh_token(&token).await {
                Ok(()) => return Ok(Some(token)),
                Err(e) if is_identifier_collision(&e)
                    && attempt < MAX_RANDOM_TOKEN_GENERATION_ATTEMPTS =>
                {
                    tracing::debug!(attempt, "Refresh token identifier collision, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Issues and persists an authorization code.
    pub async fn issue_auth_code(
        &self,
        ttl: Duration,
        client: &Client,
        user_identifier: &str,
        redirect_uri: Option<&str>,
        scopes: &[Scope],
    ) -> OAuthResult<AuthCode> {
        let repository = self.auth_code_repository()?;

        let mut code = repository.get_new_auth_code(client, scopes, Some(user_identifier));
        code.expires_at = OffsetDateTime::now_utc() + ttl;
        code.redirect_uri = redirect_uri.map(str::to_string);

        let mut attempt = 1;
        loop {
            code.identifier = generate_unique_identifier();
            match repository.persist_new_auth_code(&code).await {
                Ok(()) => return Ok(code),
                Err(e) if is_identifier_collision(&e)
                    && attempt < MAX_RANDOM_TOKEN_GENERATION_ATTEMPTS =>
                {
                    tracing::debug!(attempt, "Auth code identifier collision, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Issues an access token and a refresh token, emitting an event for
    /// each and injecting both into `response_type`.
    pub(crate) async fn issue_token_pair(
        &self,
        request: &dyn OAuthRequest,
        response_type: &mut dyn ResponseType,
        ttl: Duration,
        client: &Client,
        user_identifier: Option<&str>,
        scopes: &[Scope],
    ) -> OAuthResult<()> {
        let access_token = self
            .issue_access_token(ttl, client, user_identifier, scopes)
            .await?;
        self.emit(RequestEvent::AccessTokenIssued, request);

        let refresh_token = self.issue_refresh_token(&access_token).await?;

        response_type.set_access_token(access_token);

        if let Some(refresh_token) = refresh_token {
            self.emit(RequestEvent::RefreshTokenIssued, request);
            response_type.set_refresh_token(refresh_token);
        }

        Ok(())
    }
}

// =============================================================================
// Grant Type Contract
// =============================================================================

/// An OAuth 2.0 grant.
///
/// Operations a grant structurally cannot perform fail with
/// [`Fault::Logic`]; they are never silent no-ops.
#[async_trait]
pub trait GrantType: Send + Sync {
    /// Grant identifier, matched against `grant_type` and stamped on
    /// authorization requests.
    fn identifier(&self) -> &'static str;

    /// Shared configuration.
    fn config(&self) -> &GrantConfig;

    /// Mutable configuration, used only while the grant is being set up.
    fn config_mut(&mut self) -> &mut GrantConfig;

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Sets the client repository.
    fn set_client_repository(&mut self, repository: Arc<dyn ClientRepository>) {
        self.config_mut().client_repository = Some(repository);
    }

    /// Sets the scope repository.
    fn set_scope_repository(&mut self, repository: Arc<dyn ScopeRepository>) {
        self.config_mut().scope_repository = Some(repository);
    }

    /// Sets the access token repository.
    fn set_access_token_repository(&mut self, repository: Arc<dyn AccessTokenRepository>) {
        self.config_mut().access_token_repository = Some(repository);
    }

    /// Sets the refresh token repository.
    ///
    /// # Errors
    ///
    /// Grants that never issue refresh tokens fail with `Fault::Logic`.
    fn set_refresh_token_repository(
        &mut self,
        repository: Arc<dyn RefreshTokenRepository>,
    ) -> OAuthResult<()> {
        self.config_mut().refresh_token_repository = Some(repository);
        Ok(())
    }

    /// Sets the refresh token lifetime.
    ///
    /// # Errors
    ///
    /// Grants that never issue refresh tokens fail with `Fault::Logic`.
    fn set_refresh_token_ttl(&mut self, ttl: Duration) -> OAuthResult<()> {
        self.config_mut().refresh_token_ttl = ttl;
        Ok(())
    }

    /// Sets the private signing key.
    fn set_private_key(&mut self, key: Arc<CryptKey>) {
        self.config_mut().private_key = Some(key);
    }

    /// Sets the symmetric encryption key.
    fn set_encryption_key(&mut self, key: EncryptionKey) {
        self.config_mut().encryption_key = Some(key);
    }

    /// Sets the default scope.
    fn set_default_scope(&mut self, scope: String) {
        self.config_mut().default_scope = Some(scope);
    }

    /// Sets the event emitter.
    fn set_emitter(&mut self, emitter: Arc<dyn EventEmitter>) {
        self.config_mut().emitter = emitter;
    }

    /// Replaces the PKCE verifier registry.
    fn set_code_challenge_verifiers(&mut self, registry: CodeChallengeVerifierRegistry) {
        self.config_mut().code_challenge_verifiers = registry;
    }

    // -------------------------------------------------------------------------
    // Token Endpoint
    // -------------------------------------------------------------------------

    /// Returns `true` if the form field `grant_type` names this grant.
    fn can_respond_to_access_token_request(&self, request: &dyn OAuthRequest) -> bool {
        request.body_param("grant_type") == Some(self.identifier())
    }

    /// Validates a token request and injects the issued tokens into
    /// `response_type`.
    async fn respond_to_access_token_request(
        &self,
        request: &dyn OAuthRequest,
        response_type: &mut dyn ResponseType,
        access_token_ttl: Duration,
    ) -> OAuthResult<()>;

    // -------------------------------------------------------------------------
    // Authorization Endpoint
    // -------------------------------------------------------------------------

    /// Returns `true` if this grant handles the authorization request.
    fn can_respond_to_authorization_request(&self, _request: &dyn OAuthRequest) -> bool {
        false
    }

    /// Validates an authorization request and builds the pending transaction.
    ///
    /// # Errors
    ///
    /// Token-endpoint-only grants fail with `Fault::Logic`.
    async fn validate_authorization_request(
        &self,
        _request: &dyn OAuthRequest,
    ) -> OAuthResult<AuthorizationRequest> {
        Err(OAuthError::logic(format!(
            "The {} grant does not handle authorization requests",
            self.identifier()
        )))
    }

    /// Completes an authorization request once the resource owner decided.
    ///
    /// # Errors
    ///
    /// Token-endpoint-only grants fail with `Fault::Logic`.
    async fn complete_authorization_request(
        &self,
        _authorization_request: AuthorizationRequest,
    ) -> OAuthResult<RedirectResponse> {
        Err(OAuthError::logic(format!(
            "The {} grant does not handle authorization requests",
            self.identifier()
        )))
    }
}
