//! Error types for the authorization server core.
//!
//! Two classes of failure exist:
//!
//! - [`ProtocolError`]: expected, client-facing and shaped after RFC 6749.
//!   These are rendered at the endpoint boundary either as a JSON body or as
//!   a redirect carrying the error parameters.
//! - [`Fault`]: a deployment or integration defect (bad key file, calling a
//!   refresh-token method on a grant that has none, a backing store outage).
//!   Faults are never converted into protocol errors inside the core.
//!
//! [`OAuthError`] unifies both so grant methods can use `?` throughout.

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// =============================================================================
// Error Type Tag
// =============================================================================

/// RFC 6749 error-type tags emitted in the `error` payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The authorization grant type is not supported.
    UnsupportedGrantType,
    /// A parameter is missing, invalid, repeated or otherwise malformed.
    InvalidRequest,
    /// Client authentication failed.
    InvalidClient,
    /// The requested scope is invalid, unknown or malformed.
    InvalidScope,
    /// The resource owner credentials were incorrect.
    InvalidCredentials,
    /// The server hit an unexpected condition.
    ServerError,
    /// The resource owner or the server denied the request.
    AccessDenied,
    /// The grant or refresh token is invalid, expired or revoked.
    InvalidGrant,
}

impl ErrorType {
    /// Returns the wire representation of the tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidScope => "invalid_scope",
            Self::InvalidCredentials => "invalid_credentials",
            Self::ServerError => "server_error",
            Self::AccessDenied => "access_denied",
            Self::InvalidGrant => "invalid_grant",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Protocol Error
// =============================================================================

/// A client-facing OAuth 2.0 error.
///
/// The payload always contains `error` and `message`; `hint` is present only
/// when one was given at construction. Apart from [`ProtocolError::set_payload`]
/// the value is immutable once built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ProtocolError {
    code: u16,
    error_type: ErrorType,
    http_status: u16,
    message: String,
    hint: Option<String>,
    redirect_uri: Option<String>,
    payload: IndexMap<String, String>,
}

impl ProtocolError {
    /// Builds a protocol error from its parts.
    #[must_use]
    pub fn new(
        message: impl Into<String>,
        code: u16,
        error_type: ErrorType,
        http_status: u16,
        hint: Option<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        let message = message.into();

        let mut payload = IndexMap::new();
        payload.insert("error".to_string(), error_type.as_str().to_string());
        payload.insert("message".to_string(), message.clone());
        if let Some(hint) = &hint {
            payload.insert("hint".to_string(), hint.clone());
        }

        Self {
            code,
            error_type,
            http_status,
            message,
            hint,
            redirect_uri,
            payload,
        }
    }

    /// Unsupported grant type error.
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(
            "The authorization grant type is not supported by the authorization server.",
            2,
            ErrorType::UnsupportedGrantType,
            400,
            Some("Check the `grant_type` parameter".to_string()),
            None,
        )
    }

    /// Invalid request error naming the offending parameter.
    ///
    /// Without an explicit hint the hint points at `parameter`.
    #[must_use]
    pub fn invalid_request(parameter: &str, hint: Option<&str>) -> Self {
        let hint = hint.map_or_else(
            || format!("Check the `{}` parameter", parameter),
            str::to_string,
        );

        Self::new(
            "The request is missing a required parameter, includes an invalid parameter value, \
             includes a parameter more than once, or is otherwise malformed.",
            3,
            ErrorType::InvalidRequest,
            400,
            Some(hint),
            None,
        )
    }

    /// Client authentication failed.
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new(
            "Client authentication failed",
            4,
            ErrorType::InvalidClient,
            401,
            None,
            None,
        )
    }

    /// Invalid scope error.
    ///
    /// An empty `scope` asks the caller to specify one or configure a default;
    /// otherwise the hint names the (HTML-escaped) scope.
    #[must_use]
    pub fn invalid_scope(scope: &str, redirect_uri: Option<String>) -> Self {
        let hint = if scope.is_empty() {
            "Specify a scope in the request or set a default scope".to_string()
        } else {
            format!("Check the `{}` scope", html_escape(scope))
        };

        Self::new(
            "The requested scope is invalid, unknown, or malformed",
            5,
            ErrorType::InvalidScope,
            400,
            Some(hint),
            redirect_uri,
        )
    }

    /// The resource owner credentials were rejected.
    #[must_use]
    pub fn invalid_credentials() -> Self {
        Self::new(
            "The user credentials were incorrect.",
            6,
            ErrorType::InvalidCredentials,
            401,
            None,
            None,
        )
    }

    /// Server error carrying a description of the condition.
    #[must_use]
    pub fn server_error(hint: &str) -> Self {
        Self::new(
            format!(
                "The authorization server encountered an unexpected condition which prevented it \
                 from fulfilling the request: {}",
                hint
            ),
            7,
            ErrorType::ServerError,
            500,
            None,
            None,
        )
    }

    /// The refresh token is invalid.
    #[must_use]
    pub fn invalid_refresh_token(hint: Option<&str>) -> Self {
        Self::new(
            "The refresh token is invalid.",
            8,
            ErrorType::InvalidRequest,
            401,
            hint.map(str::to_string),
            None,
        )
    }

    /// The resource owner or the server denied the request.
    #[must_use]
    pub fn access_denied(hint: Option<&str>, redirect_uri: Option<String>) -> Self {
        Self::new(
            "The resource owner or authorization server denied the request.",
            9,
            ErrorType::AccessDenied,
            401,
            hint.map(str::to_string),
            redirect_uri,
        )
    }

    /// The provided grant is invalid.
    #[must_use]
    pub fn invalid_grant(hint: Option<&str>) -> Self {
        Self::new(
            "The provided authorization grant (e.g., authorization code, resource owner \
             credentials) or refresh token is invalid, expired, revoked, does not match the \
             redirection URI used in the authorization request, or was issued to another client.",
            10,
            ErrorType::InvalidGrant,
            400,
            hint.map(str::to_string),
            None,
        )
    }

    /// Internal numeric error code.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.code
    }

    /// RFC 6749 error-type tag.
    #[must_use]
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// HTTP status used when the error is rendered without a redirect.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Optional hint for the client developer.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Redirect target, if the error should be reported back to the client.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    /// Returns `true` when rendering produces a 302 instead of the HTTP status.
    #[must_use]
    pub fn has_redirect(&self) -> bool {
        self.redirect_uri.is_some()
    }

    /// Ordered response payload.
    #[must_use]
    pub fn payload(&self) -> &IndexMap<String, String> {
        &self.payload
    }

    /// Replaces the payload wholesale.
    pub fn set_payload(&mut self, payload: IndexMap<String, String>) {
        self.payload = payload;
    }

    /// Error category for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self.error_type {
            ErrorType::InvalidClient | ErrorType::InvalidCredentials | ErrorType::InvalidGrant => {
                ErrorCategory::Authentication
            }
            ErrorType::InvalidScope | ErrorType::AccessDenied => ErrorCategory::Authorization,
            ErrorType::InvalidRequest | ErrorType::UnsupportedGrantType => {
                ErrorCategory::Validation
            }
            ErrorType::ServerError => ErrorCategory::Internal,
        }
    }
}

/// Escapes HTML special characters, leaving existing entities intact.
fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for (idx, ch) in s.char_indices() {
        match ch {
            '&' if starts_with_entity(&s[idx..]) => escaped.push('&'),
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

static ENTITY_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^&(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#[xX][0-9A-Fa-f]+);")
        .expect("Invalid entity regex")
});

fn starts_with_entity(s: &str) -> bool {
    ENTITY_REGEX.is_match(s)
}

// =============================================================================
// Faults
// =============================================================================

/// Configuration or programming faults.
///
/// These indicate a defect in deployment or integration rather than a bad
/// client request. The core never catches them; the host turns them into a
/// 500-class response or aborts.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    /// A method was called in a way the grant structurally cannot support.
    #[error("Logic error: {message}")]
    Logic {
        /// Description of the misuse.
        message: String,
    },

    /// Key material or other configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A repository reported a backing-store failure.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// A token identifier collided with an existing one on persist.
    #[error("Could not create unique access token identifier")]
    UniqueTokenIdentifier,

    /// Signing or encryption failed.
    #[error("Crypto error: {message}")]
    Crypto {
        /// Description of the crypto failure.
        message: String,
    },
}

// =============================================================================
// Unified Error
// =============================================================================

/// Error returned by every fallible operation of the core.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Expected, client-facing failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Deployment or integration defect.
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl OAuthError {
    /// Creates a `Fault::Logic` error.
    #[must_use]
    pub fn logic(message: impl Into<String>) -> Self {
        Self::Fault(Fault::Logic {
            message: message.into(),
        })
    }

    /// Creates a `Fault::Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Fault(Fault::Configuration {
            message: message.into(),
        })
    }

    /// Creates a `Fault::Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Fault(Fault::Storage {
            message: message.into(),
        })
    }

    /// Creates a `Fault::UniqueTokenIdentifier` error.
    #[must_use]
    pub fn unique_token_identifier() -> Self {
        Self::Fault(Fault::UniqueTokenIdentifier)
    }

    /// Creates a `Fault::Crypto` error.
    #[must_use]
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Fault(Fault::Crypto {
            message: message.into(),
        })
    }

    /// Returns `true` if this is a client-facing protocol error.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns `true` if this is a configuration or programming fault.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }

    /// Returns `true` if this is a `Fault::Logic`.
    #[must_use]
    pub fn is_logic_fault(&self) -> bool {
        matches!(self, Self::Fault(Fault::Logic { .. }))
    }

    /// Borrows the protocol error, if any.
    #[must_use]
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Self::Protocol(err) => Some(err),
            Self::Fault(_) => None,
        }
    }

    /// Returns the error category for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Protocol(err) => err.category(),
            Self::Fault(Fault::Logic { .. } | Fault::Crypto { .. }) => ErrorCategory::Internal,
            Self::Fault(Fault::Configuration { .. }) => ErrorCategory::Configuration,
            Self::Fault(Fault::Storage { .. } | Fault::UniqueTokenIdentifier) => {
                ErrorCategory::Infrastructure
            }
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Client or resource owner identity could not be verified.
    Authentication,
    /// The request was understood but not permitted.
    Authorization,
    /// Request validation errors.
    Validation,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
