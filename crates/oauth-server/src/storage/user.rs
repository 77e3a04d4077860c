//! User repository trait.

use async_trait::async_trait;

use crate::OAuthResult;
use crate::types::{Client, User};

/// Resource owner credential validation for the password grant.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Returns the user matching `username` and `password`.
    ///
    /// `None` means the credentials were rejected.
    async fn get_user_entity_by_user_credentials(
        &self,
        username: &str,
        password: &str,
        grant_type: &str,
        client: &Client,
    ) -> OAuthResult<Option<User>>;
}
