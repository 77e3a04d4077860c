//! Redirect URI resolution and construction.
//!
//! [`RedirectUriResolver`] is the only place a client-supplied redirect URI
//! is checked against the client's registration. Matching is exact string
//! comparison; no normalization, prefix or wildcard matching is performed.

use std::sync::Arc;

use crate::error::ProtocolError;
use crate::events::{EventEmitter, RequestEvent};
use crate::http::OAuthRequest;
use crate::types::Client;

/// Resolves the redirect URI of an authorization request.
#[derive(Clone)]
pub struct RedirectUriResolver {
    emitter: Arc<dyn EventEmitter>,
}

impl RedirectUriResolver {
    /// Creates a resolver that reports failures to `emitter`.
    #[must_use]
    pub fn new(emitter: Arc<dyn EventEmitter>) -> Self {
        Self { emitter }
    }

    /// Resolves the redirect URI for `client`.
    ///
    /// - A supplied URI must exactly match one of the registered URIs.
    /// - Without a supplied URI the client must have exactly one non-empty
    ///   registered URI, which is returned.
    ///
    /// Any other case emits a client-authentication-failed event and fails
    /// with `invalid_client`.
    pub fn resolve(
        &self,
        client: &Client,
        request: &dyn OAuthRequest,
        redirect_uri: Option<&str>,
    ) -> Result<String, ProtocolError> {
        let resolved = match redirect_uri {
            Some(supplied) => client
                .redirect_uris
                .iter()
                .any(|registered| registered == supplied)
                .then(|| supplied.to_string()),
            None => client.single_redirect_uri().map(str::to_string),
        };

        resolved.ok_or_else(|| {
            tracing::warn!(
                client_id = %client.identifier,
                supplied = redirect_uri.unwrap_or_default(),
                registered = client.redirect_uris.len(),
                "Redirect URI rejected"
            );
            self.emitter
                .emit(RequestEvent::ClientAuthenticationFailed, request);
            ProtocolError::invalid_client()
        })
    }
}

impl std::fmt::Debug for RedirectUriResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectUriResolver").finish_non_exhaustive()
    }
}

/// Appends `params` to `uri` after `delimiter` (`?` or `#`).
///
/// When `uri` already contains the delimiter the parameters are joined with
/// `&`. Parameters whose value is `None` are skipped.
#[must_use]
pub fn make_redirect_uri(uri: &str, params: &[(&str, Option<&str>)], delimiter: char) -> String {
    let separator = if uri.contains(delimiter) { '&' } else { delimiter };

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(
            params
                .iter()
                .filter_map(|(name, value)| value.map(|value| (*name, value))),
        )
        .finish();

    format!("{}{}{}", uri, separator, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use crate::http::RequestParams;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEmitter {
        events: Mutex<Vec<RequestEvent>>,
    }

    impl EventEmitter for RecordingEmitter {
        fn emit(&self, event: RequestEvent, _request: &dyn OAuthRequest) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn resolver() -> (RedirectUriResolver, Arc<RecordingEmitter>) {
        let emitter = Arc::new(RecordingEmitter::default());
        (RedirectUriResolver::new(emitter.clone()), emitter)
    }

    #[test]
    fn test_single_registered_uri_without_supplied() {
        let (resolver, emitter) = resolver();
        let client = Client::new("app", "App").with_redirect_uri("https://app/cb");

        let uri = resolver.resolve(&client, &RequestParams::new(), None).unwrap();
        assert_eq!(uri, "https://app/cb");
        assert!(emitter.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_supplied_must_match_registered_set() {
        let (resolver, emitter) = resolver();
        let client = Client::new("app", "App").with_redirect_uris(["https://a/cb", "https://b/cb"]);
        let request = RequestParams::new();

        assert_eq!(
            resolver.resolve(&client, &request, Some("https://a/cb")).unwrap(),
            "https://a/cb"
        );
        assert_eq!(
            resolver.resolve(&client, &request, Some("https://b/cb")).unwrap(),
            "https://b/cb"
        );

        let err = resolver
            .resolve(&client, &request, Some("https://evil/cb"))
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidClient);
        assert_eq!(
            *emitter.events.lock().unwrap(),
            vec![RequestEvent::ClientAuthenticationFailed]
        );
    }

    #[test]
    fn test_no_prefix_matching() {
        let (resolver, _) = resolver();
        let client = Client::new("app", "App").with_redirect_uri("https://app/cb");

        for supplied in ["https://app/cb/", "https://app/cb?x=1", "https://app/c", "HTTPS://app/cb"] {
            assert!(
                resolver
                    .resolve(&client, &RequestParams::new(), Some(supplied))
                    .is_err(),
                "{} should be rejected",
                supplied
            );
        }
    }

    #[test]
    fn test_ambiguous_or_missing_registration_without_supplied() {
        let (resolver, emitter) = resolver();
        let request = RequestParams::new();

        let none = Client::new("app", "App");
        let many = Client::new("app", "App").with_redirect_uris(["https://a/cb", "https://b/cb"]);
        let empty = Client::new("app", "App").with_redirect_uri("");

        for client in [none, many, empty] {
            let err = resolver.resolve(&client, &request, None).unwrap_err();
            assert_eq!(err.error_type(), ErrorType::InvalidClient);
        }
        assert_eq!(emitter.events.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_make_redirect_uri() {
        let uri = make_redirect_uri(
            "https://app/cb",
            &[("access_token", Some("abc")), ("state", Some("a b")), ("skip", None)],
            '#',
        );
        assert_eq!(uri, "https://app/cb#access_token=abc&state=a+b");

        let uri = make_redirect_uri("https://app/cb?x=1", &[("code", Some("c"))], '?');
        assert_eq!(uri, "https://app/cb?x=1&code=c");

        let uri = make_redirect_uri("https://app/cb", &[("state", None)], '?');
        assert_eq!(uri, "https://app/cb?");
    }
}
