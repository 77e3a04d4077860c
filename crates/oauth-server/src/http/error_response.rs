//! Rendering of protocol errors as HTTP responses.
//!
//! A [`ProtocolError`] with a redirect target becomes a `302 Found` whose
//! `Location` carries the error payload; anything else becomes a JSON body
//! with the error's HTTP status.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::{ErrorType, OAuthError, ProtocolError};

// =============================================================================
// Rendering
// =============================================================================

impl ProtocolError {
    /// Headers sent with a non-redirect error response.
    ///
    /// `invalid_client` errors carry a `WWW-Authenticate` challenge whose
    /// scheme mirrors the inbound `Authorization` header: `Bearer` when the
    /// client presented a bearer token, `Basic` otherwise.
    #[must_use]
    pub fn http_headers(&self, authorization_header: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        if self.error_type() == ErrorType::InvalidClient {
            let scheme = match authorization_header {
                Some(value) if value.starts_with("Bearer") => "Bearer",
                _ => "Basic",
            };
            if let Ok(value) = HeaderValue::from_str(&format!("{} realm=\"OAuth\"", scheme)) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        headers
    }

    /// The `Location` a redirecting error points at, payload included.
    ///
    /// Returns `None` when the error has no redirect target.
    #[must_use]
    pub fn redirect_location(&self, use_fragment: bool) -> Option<String> {
        let target = self.redirect_uri()?;

        let delimiter = if use_fragment { '#' } else { '?' };
        let separator = if target.contains(delimiter) { '&' } else { delimiter };

        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.payload().iter())
            .finish();

        Some(format!("{}{}{}", target, separator, query))
    }

    /// Renders the error as an HTTP response.
    ///
    /// `use_fragment` selects where redirect parameters go; it is ignored
    /// when the error has no redirect target.
    #[must_use]
    pub fn generate_http_response(
        &self,
        use_fragment: bool,
        authorization_header: Option<&str>,
    ) -> Response {
        if let Some(location) = self.redirect_location(use_fragment) {
            return match HeaderValue::from_str(&location) {
                Ok(value) => {
                    let mut headers = HeaderMap::new();
                    headers.insert(header::LOCATION, value);
                    (StatusCode::FOUND, headers).into_response()
                }
                Err(_) => {
                    tracing::error!(location = %location, "Redirect location is not a valid header value");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            };
        }

        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (
            status,
            self.http_headers(authorization_header),
            Json(self.payload().clone()),
        )
            .into_response()
    }
}

// =============================================================================
// IntoResponse Implementations
// =============================================================================

impl OAuthError {
    /// Renders the error for a request that carried `authorization_header`.
    ///
    /// Faults become an opaque `server_error` and are logged. Prefer this over
    /// [`IntoResponse`], which has no access to the inbound request and always
    /// challenges with `Basic`.
    #[must_use]
    pub fn into_response_for(self, authorization_header: Option<&str>) -> Response {
        match self {
            Self::Protocol(err) => err.generate_http_response(false, authorization_header),
            Self::Fault(fault) => {
                let err = OAuthError::Fault(fault);
                tracing::error!(
                    error = %err,
                    category = %err.category(),
                    "Unhandled fault in authorization server"
                );
                ProtocolError::server_error("see server logs for details")
                    .generate_http_response(false, authorization_header)
            }
        }
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        self.generate_http_response(false, None)
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        self.into_response_for(None)
    }
}
