//! Shared in-memory repositories and fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, RwLock};

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use oauth_server::OAuthResult;
use oauth_server::crypto::{CryptKey, EncryptionKey};
use oauth_server::error::{OAuthError, ProtocolError};
use oauth_server::events::{EventEmitter, RequestEvent};
use oauth_server::grant::GrantType;
use oauth_server::http::OAuthRequest;
use oauth_server::server::AuthorizationServer;
use oauth_server::storage::{
    AccessTokenRepository, AuthCodeRepository, ClientRepository, RefreshTokenRepository,
    ScopeRepository, UserRepository,
};
use oauth_server::types::{AccessToken, AuthCode, Client, RefreshToken, Scope, User};

pub const WEB_CALLBACK: &str = "https://web.example.com/callback";
pub const SPA_CALLBACK: &str = "https://spa.example.com/cb";
pub const MULTI_CALLBACK_A: &str = "https://multi.example.com/a";
pub const MULTI_CALLBACK_B: &str = "https://multi.example.com/b";
pub const WEB_SECRET: &str = "web-secret";

/// One RSA key pair per test binary: `(private PKCS#8 PEM, public SPKI PEM)`.
static TEST_KEY: LazyLock<(String, String)> = LazyLock::new(|| {
    let key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let private_pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
    let public_pem = key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap();
    (private_pem, public_pem)
});

/// Routes grant logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}

pub fn private_pem() -> &'static str {
    &TEST_KEY.0
}

pub fn public_pem() -> &'static str {
    &TEST_KEY.1
}

/// Verifies an RS256 access token for `audience` and returns its claims.
pub fn verify_jwt(jwt: &str, audience: &str) -> serde_json::Value {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    decode::<serde_json::Value>(
        jwt,
        &DecodingKey::from_rsa_pem(public_pem().as_bytes()).unwrap(),
        &validation,
    )
    .unwrap()
    .claims
}

/// Reads a JSON response body.
pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Unwraps a protocol error, panicking on faults.
pub fn protocol(err: OAuthError) -> ProtocolError {
    match err {
        OAuthError::Protocol(err) => err,
        OAuthError::Fault(fault) => panic!("expected protocol error, got fault: {fault}"),
    }
}

/// Splits the parameters after `delimiter` in a redirect URI.
pub fn redirect_params(uri: &str, delimiter: char) -> HashMap<String, String> {
    let (_, params) = uri.split_once(delimiter).unwrap();
    url::form_urlencoded::parse(params.as_bytes())
        .into_owned()
        .collect()
}

// =============================================================================
// Repositories
// =============================================================================

/// Clients keyed by identifier, with an optional secret.
#[derive(Default)]
pub struct MemoryClients {
    clients: RwLock<HashMap<String, (Client, Option<String>)>>,
}

impl MemoryClients {
    pub fn add(&self, client: Client, secret: Option<&str>) {
        self.clients.write().unwrap().insert(
            client.identifier.clone(),
            (client, secret.map(str::to_string)),
        );
    }
}

#[async_trait]
impl ClientRepository for MemoryClients {
    async fn get_client_entity(
        &self,
        identifier: &str,
        _grant_type: &str,
        client_secret: Option<&str>,
        must_validate_secret: bool,
    ) -> OAuthResult<Option<Client>> {
        let clients = self.clients.read().unwrap();
        let Some((client, secret)) = clients.get(identifier) else {
            return Ok(None);
        };

        if must_validate_secret && client.confidential && secret.as_deref() != client_secret {
            return Ok(None);
        }

        Ok(Some(client.clone()))
    }
}

/// Known scopes. Finalization drops any scope in `pruned`.
#[derive(Default)]
pub struct MemoryScopes {
    known: RwLock<HashSet<String>>,
    pruned: RwLock<HashSet<String>>,
    finalize_calls: Mutex<Vec<(String, Option<String>)>>,
}

impl MemoryScopes {
    pub fn with_scopes(scopes: &[&str]) -> Self {
        let repository = Self::default();
        repository
            .known
            .write()
            .unwrap()
            .extend(scopes.iter().map(|s| s.to_string()));
        repository
    }

    pub fn prune(&self, scope: &str) {
        self.pruned.write().unwrap().insert(scope.to_string());
    }

    /// `(grant_type, user)` for every finalize call so far.
    pub fn finalize_calls(&self) -> Vec<(String, Option<String>)> {
        self.finalize_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScopeRepository for MemoryScopes {
    async fn get_scope_entity_by_identifier(
        &self,
        identifier: &str,
    ) -> OAuthResult<Option<Scope>> {
        Ok(self
            .known
            .read()
            .unwrap()
            .contains(identifier)
            .then(|| Scope::new(identifier)))
    }

    async fn finalize_scopes(
        &self,
        scopes: Vec<Scope>,
        grant_type: &str,
        _client: &Client,
        user_identifier: Option<&str>,
    ) -> OAuthResult<Vec<Scope>> {
        self.finalize_calls
            .lock()
            .unwrap()
            .push((grant_type.to_string(), user_identifier.map(str::to_string)));

        let pruned = self.pruned.read().unwrap();
        Ok(scopes
            .into_iter()
            .filter(|s| !pruned.contains(&s.identifier))
            .collect())
    }
}

/// Access tokens with revocation and injectable identifier collisions.
#[derive(Default)]
pub struct MemoryAccessTokens {
    tokens: RwLock<HashMap<String, AccessToken>>,
    revoked: RwLock<HashSet<String>>,
    collisions: AtomicUsize,
    persist_attempts: AtomicUsize,
    storage_down: std::sync::atomic::AtomicBool,
}

impl MemoryAccessTokens {
    /// Makes the next `count` persist calls report an identifier collision.
    pub fn collide_next(&self, count: usize) {
        self.collisions.store(count, Ordering::SeqCst);
    }

    /// Makes every persist call fail with a storage fault.
    pub fn fail_storage(&self) {
        self.storage_down.store(true, Ordering::SeqCst);
    }

    pub fn persist_attempts(&self) -> usize {
        self.persist_attempts.load(Ordering::SeqCst)
    }

    pub fn get(&self, identifier: &str) -> Option<AccessToken> {
        self.tokens.read().unwrap().get(identifier).cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.read().unwrap().len()
    }

    pub fn is_revoked(&self, identifier: &str) -> bool {
        self.revoked.read().unwrap().contains(identifier)
    }
}

#[async_trait]
impl AccessTokenRepository for MemoryAccessTokens {
    async fn persist_new_access_token(&self, token: &AccessToken) -> OAuthResult<()> {
        self.persist_attempts.fetch_add(1, Ordering::SeqCst);

        if self.storage_down.load(Ordering::SeqCst) {
            return Err(OAuthError::storage("connection refused"));
        }

        let collide = self
            .collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collide {
            return Err(OAuthError::unique_token_identifier());
        }

        let mut tokens = self.tokens.write().unwrap();
        if tokens.contains_key(&token.identifier) {
            return Err(OAuthError::unique_token_identifier());
        }
        tokens.insert(token.identifier.clone(), token.clone());
        Ok(())
    }

    async fn revoke_access_token(&self, token_id: &str) -> OAuthResult<()> {
        self.revoked.write().unwrap().insert(token_id.to_string());
        Ok(())
    }

    async fn is_access_token_revoked(&self, token_id: &str) -> OAuthResult<bool> {
        Ok(self.is_revoked(token_id))
    }
}

/// Refresh tokens with revocation.
#[derive(Default)]
pub struct MemoryRefreshTokens {
    tokens: RwLock<HashMap<String, RefreshToken>>,
    revoked: RwLock<HashSet<String>>,
}

impl MemoryRefreshTokens {
    pub fn len(&self) -> usize {
        self.tokens.read().unwrap().len()
    }

    pub fn is_revoked(&self, identifier: &str) -> bool {
        self.revoked.read().unwrap().contains(identifier)
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryRefreshTokens {
    async fn persist_new_refresh_token(&self, token: &RefreshToken) -> OAuthResult<()> {
        let mut tokens = self.tokens.write().unwrap();
        if tokens.contains_key(&token.identifier) {
            return Err(OAuthError::unique_token_identifier());
        }
        tokens.insert(token.identifier.clone(), token.clone());
        Ok(())
    }

    async fn revoke_refresh_token(&self, token_id: &str) -> OAuthResult<()> {
        self.revoked.write().unwrap().insert(token_id.to_string());
        Ok(())
    }

    async fn is_refresh_token_revoked(&self, token_id: &str) -> OAuthResult<bool> {
        Ok(self.is_revoked(token_id))
    }
}

/// Authorization codes with revocation.
#[derive(Default)]
pub struct MemoryAuthCodes {
    codes: RwLock<HashMap<String, AuthCode>>,
    revoked: RwLock<HashSet<String>>,
}

impl MemoryAuthCodes {
    pub fn all(&self) -> Vec<AuthCode> {
        self.codes.read().unwrap().values().cloned().collect()
    }

    pub fn is_revoked(&self, identifier: &str) -> bool {
        self.revoked.read().unwrap().contains(identifier)
    }
}

#[async_trait]
impl AuthCodeRepository for MemoryAuthCodes {
    async fn persist_new_auth_code(&self, code: &AuthCode) -> OAuthResult<()> {
        let mut codes = self.codes.write().unwrap();
        if codes.contains_key(&code.identifier) {
            return Err(OAuthError::unique_token_identifier());
        }
        codes.insert(code.identifier.clone(), code.clone());
        Ok(())
    }

    async fn revoke_auth_code(&self, code_id: &str) -> OAuthResult<()> {
        self.revoked.write().unwrap().insert(code_id.to_string());
        Ok(())
    }

    async fn is_auth_code_revoked(&self, code_id: &str) -> OAuthResult<bool> {
        Ok(self.is_revoked(code_id))
    }
}

/// Users keyed by username: `username -> (password, user)`.
#[derive(Default)]
pub struct MemoryUsers {
    users: RwLock<HashMap<String, (String, User)>>,
}

impl MemoryUsers {
    pub fn add(&self, username: &str, password: &str, user: User) {
        self.users
            .write()
            .unwrap()
            .insert(username.to_string(), (password.to_string(), user));
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn get_user_entity_by_user_credentials(
        &self,
        username: &str,
        password: &str,
        _grant_type: &str,
        _client: &Client,
    ) -> OAuthResult<Option<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .get(username)
            .filter(|(expected, _)| expected == password)
            .map(|(_, user)| user.clone()))
    }
}

/// Records emitted events in order.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<RequestEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<RequestEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: RequestEvent, _request: &dyn OAuthRequest) {
        self.events.lock().unwrap().push(event);
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Repositories, keys and an emitter wired together.
///
/// Registered clients:
/// - `web`: confidential, secret [`WEB_SECRET`], redirect [`WEB_CALLBACK`]
/// - `spa`: public, redirect [`SPA_CALLBACK`]
/// - `multi`: public, redirects [`MULTI_CALLBACK_A`] and [`MULTI_CALLBACK_B`]
/// - `bare`: public, no redirect URIs
///
/// Known scopes: `basic`, `read`, `write`, `admin`.
pub struct Harness {
    pub clients: Arc<MemoryClients>,
    pub scopes: Arc<MemoryScopes>,
    pub access_tokens: Arc<MemoryAccessTokens>,
    pub refresh_tokens: Arc<MemoryRefreshTokens>,
    pub auth_codes: Arc<MemoryAuthCodes>,
    pub users: Arc<MemoryUsers>,
    pub emitter: Arc<RecordingEmitter>,
    pub private_key: Arc<CryptKey>,
    pub encryption_key: EncryptionKey,
    _key_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();

        let key_dir = tempfile::tempdir().unwrap();
        let private_key =
            Arc::new(CryptKey::with_temp_dir(private_pem(), None, false, key_dir.path()).unwrap());

        let clients = MemoryClients::default();
        clients.add(
            Client::new("web", "Web App")
                .with_redirect_uri(WEB_CALLBACK)
                .confidential(),
            Some(WEB_SECRET),
        );
        clients.add(
            Client::new("spa", "Single Page App").with_redirect_uri(SPA_CALLBACK),
            None,
        );
        clients.add(
            Client::new("multi", "Multi Redirect App")
                .with_redirect_uris([MULTI_CALLBACK_A, MULTI_CALLBACK_B]),
            None,
        );
        clients.add(Client::new("bare", "No Redirect App"), None);

        let users = MemoryUsers::default();
        users.add("alice", "wonderland", User::new("user-alice"));

        Self {
            clients: Arc::new(clients),
            scopes: Arc::new(MemoryScopes::with_scopes(&["basic", "read", "write", "admin"])),
            access_tokens: Arc::new(MemoryAccessTokens::default()),
            refresh_tokens: Arc::new(MemoryRefreshTokens::default()),
            auth_codes: Arc::new(MemoryAuthCodes::default()),
            users: Arc::new(users),
            emitter: Arc::new(RecordingEmitter::default()),
            private_key,
            encryption_key: EncryptionKey::generate(),
            _key_dir: key_dir,
        }
    }

    /// A server wired to this harness with no grants enabled.
    pub fn server(&self) -> AuthorizationServer {
        let mut server = AuthorizationServer::new(
            self.clients.clone(),
            self.access_tokens.clone(),
            self.scopes.clone(),
            Arc::clone(&self.private_key),
            Some(self.encryption_key.clone()),
        );
        server.set_emitter(self.emitter.clone());
        server
    }

    /// Configures a grant directly, without a server.
    pub fn configure<G: GrantType>(&self, grant: &mut G, default_scope: Option<&str>) {
        grant.set_client_repository(self.clients.clone());
        grant.set_scope_repository(self.scopes.clone());
        grant.set_access_token_repository(self.access_tokens.clone());
        grant.set_private_key(Arc::clone(&self.private_key));
        grant.set_encryption_key(self.encryption_key.clone());
        grant.set_emitter(self.emitter.clone());
        if let Some(scope) = default_scope {
            grant.set_default_scope(scope.to_string());
        }
    }
}
