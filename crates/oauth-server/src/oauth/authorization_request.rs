//! In-flight authorization transaction.
//!
//! An [`AuthorizationRequest`] is produced by a grant's
//! `validate_authorization_request`, carried by the host across the login and
//! consent step (typically serialized into a session), and consumed by value
//! in `complete_authorization_request`.
//!
//! Only the producing grant fills in the request. The host records the
//! resource owner and the decision through [`AuthorizationRequest::set_user`]
//! and [`AuthorizationRequest::set_authorization_approved`].

use serde::{Deserialize, Serialize};

use crate::types::{Client, Scope, User};

/// State of one "resource owner authorizes client" flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    grant_type_id: String,
    client: Client,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    scopes: Vec<Scope>,
    #[serde(default)]
    authorization_approved: bool,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    code_challenge: Option<String>,
    #[serde(default)]
    code_challenge_method: Option<String>,
}

impl AuthorizationRequest {
    /// Starts a request for `client` under the grant named `grant_type_id`.
    #[must_use]
    pub(crate) fn new(grant_type_id: impl Into<String>, client: Client) -> Self {
        Self {
            grant_type_id: grant_type_id.into(),
            client,
            user: None,
            scopes: Vec::new(),
            authorization_approved: false,
            redirect_uri: None,
            state: None,
            code_challenge: None,
            code_challenge_method: None,
        }
    }

    /// Identifier of the grant that produced this request.
    #[must_use]
    pub fn grant_type_id(&self) -> &str {
        &self.grant_type_id
    }

    /// The requesting client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The authenticated resource owner, once set.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Attaches the authenticated resource owner.
    pub fn set_user(&mut self, user: User) {
        self.user = Some(user);
    }

    /// Requested scopes, in request order.
    #[must_use]
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Replaces the requested scopes.
    pub(crate) fn set_scopes(&mut self, scopes: Vec<Scope>) {
        self.scopes = scopes;
    }

    /// Whether the resource owner approved the request.
    #[must_use]
    pub fn is_authorization_approved(&self) -> bool {
        self.authorization_approved
    }

    /// Records the resource owner's decision.
    pub fn set_authorization_approved(&mut self, approved: bool) {
        self.authorization_approved = approved;
    }

    /// Redirect URI supplied with the request, if any.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    /// Sets the resolved redirect URI.
    pub(crate) fn set_redirect_uri(&mut self, redirect_uri: impl Into<String>) {
        self.redirect_uri = Some(redirect_uri.into());
    }

    /// Redirect target for the final response.
    ///
    /// Falls back to the client's first registered URI when none was set.
    #[must_use]
    pub fn final_redirect_uri(&self) -> Option<&str> {
        self.redirect_uri
            .as_deref()
            .or_else(|| self.client.first_redirect_uri())
    }

    /// Opaque `state` value echoed back to the client.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Sets the `state` value.
    pub(crate) fn set_state(&mut self, state: impl Into<String>) {
        self.state = Some(state.into());
    }

    /// PKCE code challenge.
    #[must_use]
    pub fn code_challenge(&self) -> Option<&str> {
        self.code_challenge.as_deref()
    }

    /// Sets the PKCE code challenge.
    pub(crate) fn set_code_challenge(&mut self, code_challenge: impl Into<String>) {
        self.code_challenge = Some(code_challenge.into());
    }

    /// PKCE code challenge method.
    #[must_use]
    pub fn code_challenge_method(&self) -> Option<&str> {
        self.code_challenge_method.as_deref()
    }

    /// Sets the PKCE code challenge method.
    pub(crate) fn set_code_challenge_method(&mut self, method: impl Into<String>) {
        self.code_challenge_method = Some(method.into());
    }
}
