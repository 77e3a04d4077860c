//! Client repository trait.

use async_trait::async_trait;

use crate::OAuthResult;
use crate::types::Client;

/// Lookup of registered clients.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Returns the client registered under `identifier`.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The `client_id` presented by the caller
    /// * `grant_type` - Identifier of the grant asking, so implementations can
    ///   restrict which clients may use which grants
    /// * `client_secret` - Secret presented by the caller, if any
    /// * `must_validate_secret` - Whether `client_secret` must be checked
    ///
    /// # Returns
    ///
    /// `None` when the client is unknown, may not use `grant_type`, or fails
    /// secret validation. The calling grant turns that into `invalid_client`.
    ///
    /// # Errors
    ///
    /// Returns an error only for backing-store failures.
    async fn get_client_entity(
        &self,
        identifier: &str,
        grant_type: &str,
        client_secret: Option<&str>,
        must_validate_secret: bool,
    ) -> OAuthResult<Option<Client>>;
}
