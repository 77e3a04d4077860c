//! Domain entities consumed by the protocol core.
//!
//! Clients, scopes and users are owned by the host's repositories; tokens are
//! created by grants and handed to the repositories for persistence.

pub mod client;
pub mod token;

pub use client::{Client, Scope, User};
pub use token::{AccessToken, AuthCode, RefreshToken};
