//! Authorization-endpoint machinery.
//!
//! - [`AuthorizationRequest`] - the in-flight transaction
//! - [`AuthorizationRequestFactory`] - builds pending requests
//! - [`RedirectUriResolver`] - exact-match redirect validation
//! - [`ScopeResolver`] - scope parsing, validation and finalization
//! - [`pkce`] - code challenge verifiers

pub mod authorization_request;
pub mod factory;
pub mod pkce;
pub mod redirect;
pub mod scopes;

pub use authorization_request::AuthorizationRequest;
pub use factory::AuthorizationRequestFactory;
pub use pkce::{
    CodeChallengeVerifier, CodeChallengeVerifierRegistry, PlainVerifier, S256Verifier,
};
pub use redirect::{RedirectUriResolver, make_redirect_uri};
pub use scopes::{ScopeResolver, ScopeSource, split_scopes};
