//! Token minting.

pub mod jwt;

pub use jwt::{AccessTokenClaims, JwtError, sign_access_token};
