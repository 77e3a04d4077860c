//! Responses produced by grants.
//!
//! - [`BearerTokenResponse`] - token endpoint JSON body
//! - [`RedirectResponse`] - authorization endpoint redirect

pub mod bearer;
pub mod redirect;

use axum::response::Response;

use crate::OAuthResult;
use crate::types::{AccessToken, RefreshToken};

pub use bearer::{BearerTokenResponse, RefreshTokenPayload};
pub use redirect::RedirectResponse;

/// Builder that grants inject issued tokens into.
pub trait ResponseType: Send {
    /// Sets the issued access token.
    fn set_access_token(&mut self, access_token: AccessToken);

    /// Sets the issued refresh token.
    fn set_refresh_token(&mut self, refresh_token: RefreshToken);

    /// Renders the HTTP response.
    ///
    /// # Errors
    ///
    /// Returns a fault if no access token was set or signing fails.
    fn generate_http_response(&self) -> OAuthResult<Response>;
}
