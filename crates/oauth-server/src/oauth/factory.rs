//! Construction of pending authorization requests.

use crate::OAuthResult;
use crate::grant::GrantType;
use crate::http::OAuthRequest;
use crate::oauth::authorization_request::AuthorizationRequest;
use crate::oauth::redirect::RedirectUriResolver;
use crate::oauth::scopes::ScopeSource;
use crate::types::Client;

/// Builds [`AuthorizationRequest`]s for grants at the authorization endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationRequestFactory;

impl AuthorizationRequestFactory {
    /// Creates a pending authorization request.
    ///
    /// Steps, in order:
    /// 1. resolve the redirect URI (fails with `invalid_client`)
    /// 2. stamp the grant identifier and client
    /// 3. resolve requested scopes from the query, falling back to the
    ///    grant's default scope
    /// 4. finalize scopes through the repository when `finalize_scopes` is set
    /// 5. attach scopes and the resolved redirect URI
    /// 6. attach `state` when non-empty
    ///
    /// Grants with a consent step pass `finalize_scopes = false` and finalize
    /// when the code or token is issued.
    pub async fn create_authorization_request(
        &self,
        grant: &dyn GrantType,
        client: Client,
        request: &dyn OAuthRequest,
        redirect_uri: Option<&str>,
        state: Option<&str>,
        finalize_scopes: bool,
    ) -> OAuthResult<AuthorizationRequest> {
        let config = grant.config();

        let resolved_redirect_uri =
            RedirectUriResolver::new(config.emitter()).resolve(&client, request, redirect_uri)?;

        let mut authorization_request = AuthorizationRequest::new(grant.identifier(), client);

        let scope_resolver = config.scope_resolver()?;
        let mut scopes = scope_resolver
            .resolve(request, ScopeSource::Query, Some(&resolved_redirect_uri))
            .await?;

        if finalize_scopes {
            scopes = scope_resolver
                .finalize(
                    scopes,
                    grant.identifier(),
                    authorization_request.client(),
                    None,
                )
                .await?;
        }

        authorization_request.set_scopes(scopes);
        authorization_request.set_redirect_uri(resolved_redirect_uri);

        if let Some(state) = state.filter(|s| !s.is_empty()) {
            authorization_request.set_state(state);
        }

        Ok(authorization_request)
    }
}
