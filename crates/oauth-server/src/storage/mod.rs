//! Repository traits for data owned by the host.
//!
//! The protocol core never decides how clients, scopes, users or tokens are
//! stored. It talks to these traits, which the host implements over its
//! database of choice:
//!
//! - [`ClientRepository`] - client lookup and credential validation
//! - [`ScopeRepository`] - scope lookup and per-grant finalization
//! - [`AccessTokenRepository`] - access token persistence and revocation
//! - [`RefreshTokenRepository`] - refresh token persistence and revocation
//! - [`AuthCodeRepository`] - authorization code persistence and revocation
//! - [`UserRepository`] - resource owner credential checks
//!
//! All repositories are shared behind `Arc` by every configured grant.
//! Persisting a token whose identifier already exists must fail with
//! [`Fault::UniqueTokenIdentifier`](crate::error::Fault::UniqueTokenIdentifier)
//! so the issuing grant can retry with a fresh identifier.

pub mod access_token;
pub mod auth_code;
pub mod client;
pub mod refresh_token;
pub mod scope;
pub mod user;

pub use access_token::AccessTokenRepository;
pub use auth_code::AuthCodeRepository;
pub use client::ClientRepository;
pub use refresh_token::RefreshTokenRepository;
pub use scope::ScopeRepository;
pub use user::UserRepository;
