//! Scope parsing, validation and finalization.

use std::sync::Arc;

use crate::OAuthResult;
use crate::error::ProtocolError;
use crate::http::OAuthRequest;
use crate::storage::ScopeRepository;
use crate::types::{Client, Scope};

/// Scope delimiter in the `scope` parameter.
const SCOPE_DELIMITER: char = ' ';

/// Where the `scope` parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSource {
    /// Authorization endpoint: query string.
    Query,
    /// Token endpoint: form body.
    Body,
}

/// Resolves requested scopes against a [`ScopeRepository`].
#[derive(Clone)]
pub struct ScopeResolver {
    repository: Arc<dyn ScopeRepository>,
    default_scope: Option<String>,
}

impl ScopeResolver {
    /// Creates a resolver over `repository` with an optional default scope.
    #[must_use]
    pub fn new(repository: Arc<dyn ScopeRepository>, default_scope: Option<String>) -> Self {
        Self {
            repository,
            default_scope,
        }
    }

    /// Reads and validates the scopes requested by `request`.
    ///
    /// An absent or blank `scope` parameter falls back to the default scope.
    /// Unknown scopes fail with `invalid_scope` naming the scope; an empty
    /// result with no default fails with `invalid_scope("")`. Both errors
    /// carry `redirect_uri` so they can be reported back to the client.
    pub async fn resolve(
        &self,
        request: &dyn OAuthRequest,
        source: ScopeSource,
        redirect_uri: Option<&str>,
    ) -> OAuthResult<Vec<Scope>> {
        let requested = match source {
            ScopeSource::Query => request.query_param("scope"),
            ScopeSource::Body => request.body_param("scope"),
        };

        let mut identifiers = requested.map(split_scopes).unwrap_or_default();
        if identifiers.is_empty()
            && let Some(default_scope) = &self.default_scope
        {
            identifiers = split_scopes(default_scope);
        }

        if identifiers.is_empty() {
            return Err(ProtocolError::invalid_scope("", redirect_uri.map(str::to_string)).into());
        }

        self.validate_scopes(&identifiers, redirect_uri).await
    }

    /// Looks up every identifier, failing on the first unknown one.
    pub async fn validate_scopes(
        &self,
        identifiers: &[String],
        redirect_uri: Option<&str>,
    ) -> OAuthResult<Vec<Scope>> {
        let mut scopes = Vec::with_capacity(identifiers.len());

        for identifier in identifiers {
            match self
                .repository
                .get_scope_entity_by_identifier(identifier)
                .await?
            {
                Some(scope) => scopes.push(scope),
                None => {
                    tracing::debug!(scope = %identifier, "Unknown scope requested");
                    return Err(ProtocolError::invalid_scope(
                        identifier,
                        redirect_uri.map(str::to_string),
                    )
                    .into());
                }
            }
        }

        Ok(scopes)
    }

    /// Delegates finalization to the repository.
    pub async fn finalize(
        &self,
        scopes: Vec<Scope>,
        grant_type: &str,
        client: &Client,
        user_identifier: Option<&str>,
    ) -> OAuthResult<Vec<Scope>> {
        self.repository
            .finalize_scopes(scopes, grant_type, client, user_identifier)
            .await
    }
}

impl std::fmt::Debug for ScopeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeResolver")
            .field("default_scope", &self.default_scope)
            .finish_non_exhaustive()
    }
}

/// Splits a space-delimited scope string, dropping empty items.
#[must_use]
pub fn split_scopes(scopes: &str) -> Vec<String> {
    scopes
        .trim()
        .split(SCOPE_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
