//! HTTP surface: inbound request abstraction and protocol error rendering.

pub mod error_response;
pub mod request;

pub use request::{OAuthRequest, RequestParams, parse_basic_auth};
