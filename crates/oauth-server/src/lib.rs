//! OAuth 2.0 authorization server protocol core.
//!
//! This crate provides the protocol engine of an OAuth 2.0 authorization
//! server: grant-type dispatch, the in-flight authorization transaction model,
//! redirect-URI and PKCE validation, token minting and the RFC 6749 error
//! taxonomy.
//!
//! # Features
//!
//! - Grant types: `client_credentials`, `implicit`, `authorization_code`,
//!   `refresh_token` and `password`
//! - Strict redirect-URI resolution (exact match against registered URIs)
//! - PKCE verification (`plain` and `S256`, constant-time comparison)
//! - RS256-signed JWT access tokens
//! - AES-256-GCM encrypted authorization codes and refresh tokens
//! - Audit events for authentication failures and token issuance
//!
//! # Architecture
//!
//! - [`error`] - Protocol errors and configuration faults
//! - [`http`] - Request abstraction and error rendering
//! - [`crypto`] - Signing key files and symmetric encryption
//! - [`types`] - Client, scope, user and token entities
//! - [`token`] - JWT access-token minting
//! - [`storage`] - Repository traits implemented by the host
//! - [`oauth`] - Authorization request model, resolvers and PKCE
//! - [`grant`] - Grant type implementations
//! - [`response_type`] - Token and redirect responses
//! - [`events`] - Audit event emission
//! - [`server`] - Grant dispatch
//! - [`config`] - Server configuration

pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod grant;
pub mod http;
pub mod oauth;
pub mod response_type;
pub mod server;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{ConfigError, OAuthServerConfig};
pub use error::{ErrorCategory, ErrorType, Fault, OAuthError, ProtocolError};
pub use server::AuthorizationServer;

/// Result type alias for protocol core operations.
pub type OAuthResult<T> = Result<T, OAuthError>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::OAuthResult;
    pub use crate::config::OAuthServerConfig;
    pub use crate::crypto::{CryptKey, EncryptionKey};
    pub use crate::error::{ErrorType, Fault, OAuthError, ProtocolError};
    pub use crate::events::{EventEmitter, RequestEvent};
    pub use crate::grant::{
        AuthCodeGrant, ClientCredentialsGrant, GrantType, ImplicitGrant, PasswordGrant,
        RefreshTokenGrant,
    };
    pub use crate::http::{OAuthRequest, RequestParams};
    pub use crate::oauth::AuthorizationRequest;
    pub use crate::response_type::{BearerTokenResponse, RedirectResponse, ResponseType};
    pub use crate::server::AuthorizationServer;
    pub use crate::types::{AccessToken, AuthCode, Client, RefreshToken, Scope, User};
}
