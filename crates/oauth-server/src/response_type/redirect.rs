//! Redirect response for the authorization endpoint.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::OAuthResult;
use crate::error::OAuthError;

/// A `302 Found` pointing back at the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResponse {
    redirect_uri: String,
}

impl RedirectResponse {
    /// Creates a redirect to `redirect_uri`.
    #[must_use]
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
        }
    }

    /// The full redirect target, parameters included.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Renders the redirect.
    ///
    /// # Errors
    ///
    /// Returns a fault if the target is not a valid header value.
    pub fn generate_http_response(&self) -> OAuthResult<Response> {
        let location = HeaderValue::from_str(&self.redirect_uri)
            .map_err(|e| OAuthError::logic(format!("Invalid redirect location: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, location);

        Ok((StatusCode::FOUND, headers).into_response())
    }
}

impl IntoResponse for RedirectResponse {
    fn into_response(self) -> Response {
        self.generate_http_response()
            .unwrap_or_else(IntoResponse::into_response)
    }
}
