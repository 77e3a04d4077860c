//! Scope repository trait.

use async_trait::async_trait;

use crate::OAuthResult;
use crate::types::{Client, Scope};

/// Lookup and finalization of scopes.
#[async_trait]
pub trait ScopeRepository: Send + Sync {
    /// Returns the scope registered under `identifier`, or `None` if unknown.
    async fn get_scope_entity_by_identifier(&self, identifier: &str)
    -> OAuthResult<Option<Scope>>;

    /// Finalizes the scope set for a grant and client pair.
    ///
    /// Implementations may prune, expand or reject requested scopes. The
    /// returned list is what gets bound to the issued token or code.
    async fn finalize_scopes(
        &self,
        scopes: Vec<Scope>,
        grant_type: &str,
        client: &Client,
        user_identifier: Option<&str>,
    ) -> OAuthResult<Vec<Scope>>;
}
