//! Client, scope and user entities.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth 2.0 client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier (`client_id`).
    pub identifier: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Registered redirect URIs. Accepts a single string or a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub redirect_uris: Vec<String>,

    /// Whether the client can keep a secret.
    #[serde(default)]
    pub confidential: bool,
}

impl Client {
    /// Creates a public client.
    #[must_use]
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            redirect_uris: Vec::new(),
            confidential: false,
        }
    }

    /// Sets a single registered redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris = vec![uri.into()];
        self
    }

    /// Sets the registered redirect URIs.
    #[must_use]
    pub fn with_redirect_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redirect_uris = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the client as confidential.
    #[must_use]
    pub fn confidential(mut self) -> Self {
        self.confidential = true;
        self
    }

    /// Client identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns `true` for confidential clients.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.confidential
    }

    /// The registered redirect URI when exactly one is registered.
    #[must_use]
    pub fn single_redirect_uri(&self) -> Option<&str> {
        match self.redirect_uris.as_slice() {
            [only] if !only.is_empty() => Some(only),
            _ => None,
        }
    }

    /// First registered redirect URI, if any.
    #[must_use]
    pub fn first_redirect_uri(&self) -> Option<&str> {
        self.redirect_uris.first().map(String::as_str)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(uri) => vec![uri],
        OneOrMany::Many(uris) => uris,
    })
}

// =============================================================================
// Scope
// =============================================================================

/// A scope, serialized as its bare identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope {
    /// Scope identifier.
    pub identifier: String,
}

impl Scope {
    /// Creates a scope.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    /// Scope identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)
    }
}

// =============================================================================
// User
// =============================================================================

/// An authenticated resource owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier, used as the token subject.
    pub identifier: String,
}

impl User {
    /// Creates a user.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    /// User identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}
