//! Bearer token response (RFC 6749 §5.1).

use std::sync::Arc;

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;

use super::ResponseType;
use crate::OAuthResult;
use crate::crypto::{CryptKey, EncryptionKey};
use crate::error::OAuthError;
use crate::types::{AccessToken, RefreshToken};

/// Encrypted content of a refresh token handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenPayload {
    /// Client the token was issued to.
    pub client_id: String,
    /// Refresh token identifier.
    pub refresh_token_id: String,
    /// Identifier of the access token issued alongside.
    pub access_token_id: String,
    /// Granted scope identifiers.
    pub scopes: Vec<String>,
    /// Resource owner, if any.
    pub user_id: Option<String>,
    /// Expiry (Unix seconds).
    pub expire_time: i64,
}

impl RefreshTokenPayload {
    /// Builds the payload for `refresh_token`.
    #[must_use]
    pub fn for_token(refresh_token: &RefreshToken) -> Self {
        let access_token = &refresh_token.access_token;
        Self {
            client_id: access_token.client.identifier.clone(),
            refresh_token_id: refresh_token.identifier.clone(),
            access_token_id: access_token.identifier.clone(),
            scopes: access_token.scope_identifiers(),
            user_id: access_token.user_identifier.clone(),
            expire_time: refresh_token.expires_at.unix_timestamp(),
        }
    }
}

/// JSON token response with a signed access token and an optional encrypted
/// refresh token.
#[derive(Debug, Clone)]
pub struct BearerTokenResponse {
    private_key: Arc<CryptKey>,
    encryption_key: Option<EncryptionKey>,
    access_token: Option<AccessToken>,
    refresh_token: Option<RefreshToken>,
}

impl BearerTokenResponse {
    /// Creates an empty response that signs with `private_key`.
    ///
    /// `encryption_key` is required only when a refresh token is set.
    #[must_use]
    pub fn new(private_key: Arc<CryptKey>, encryption_key: Option<EncryptionKey>) -> Self {
        Self {
            private_key,
            encryption_key,
            access_token: None,
            refresh_token: None,
        }
    }

    /// The access token set by the grant.
    #[must_use]
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// The refresh token set by the grant.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    /// Builds the JSON body.
    ///
    /// # Errors
    ///
    /// Returns a fault if no access token was set, if signing fails, or if a
    /// refresh token is present without an encryption key.
    pub fn body(&self) -> OAuthResult<serde_json::Value> {
        let access_token = self
            .access_token
            .as_ref()
            .ok_or_else(|| OAuthError::logic("No access token set on the response"))?;

        let expires_in = (access_token.expires_at - OffsetDateTime::now_utc()).whole_seconds();

        let mut body = json!({
            "token_type": "Bearer",
            "expires_in": expires_in,
            "access_token": access_token.convert_to_jwt(&self.private_key)?,
        });

        if let Some(refresh_token) = &self.refresh_token {
            let encryption_key = self.encryption_key.as_ref().ok_or_else(|| {
                OAuthError::configuration("An encryption key is required to issue refresh tokens")
            })?;

            let payload = serde_json::to_string(&RefreshTokenPayload::for_token(refresh_token))
                .map_err(|e| OAuthError::crypto(e.to_string()))?;
            body["refresh_token"] = json!(encryption_key.encrypt(&payload)?);
        }

        Ok(body)
    }
}

impl ResponseType for BearerTokenResponse {
    fn set_access_token(&mut self, access_token: AccessToken) {
        self.access_token = Some(access_token);
    }

    fn set_refresh_token(&mut self, refresh_token: RefreshToken) {
        self.refresh_token = Some(refresh_token);
    }

    fn generate_http_response(&self) -> OAuthResult<Response> {
        let body = self.body()?;

        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

        Ok((StatusCode::OK, headers, Json(body)).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Client, Scope};
    use rand::rngs::OsRng;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use time::Duration;

    fn private_key(dir: &std::path::Path) -> Arc<CryptKey> {
        let key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap();
        Arc::new(CryptKey::with_temp_dir(&pem, None, false, dir).unwrap())
    }

    fn access_token() -> AccessToken {
        let mut token = AccessToken::new(
            Client::new("app", "App"),
            vec![Scope::new("read")],
            Some("alice".into()),
        );
        token.identifier = "at-1".into();
        token.expires_at = OffsetDateTime::now_utc() + Duration::hours(1);
        token
    }

    #[test]
    fn test_missing_access_token_is_a_fault() {
        let dir = tempfile::tempdir().unwrap();
        let response = BearerTokenResponse::new(private_key(dir.path()), None);
        assert!(response.body().unwrap_err().is_logic_fault());
    }

    #[test]
    fn test_body_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut response = BearerTokenResponse::new(private_key(dir.path()), None);
        response.set_access_token(access_token());

        let body = response.body().unwrap();
        assert_eq!(body["token_type"], "Bearer");
        let expires_in = body["expires_in"].as_i64().unwrap();
        assert!(expires_in > 3590 && expires_in <= 3600);
        assert_eq!(body["access_token"].as_str().unwrap().split('.').count(), 3);
        assert!(body.get("refresh_token").is_none());
    }

    #[test]
    fn test_refresh_token_is_encrypted_payload() {
        let dir = tempfile::tempdir().unwrap();
        let encryption_key = EncryptionKey::generate();
        let mut response =
            BearerTokenResponse::new(private_key(dir.path()), Some(encryption_key.clone()));

        let access_token = access_token();
        let mut refresh_token = RefreshToken::new(access_token.clone());
        refresh_token.identifier = "rt-1".into();
        refresh_token.expires_at = OffsetDateTime::now_utc() + Duration::days(30);

        response.set_access_token(access_token);
        response.set_refresh_token(refresh_token.clone());

        let body = response.body().unwrap();
        let decrypted = encryption_key
            .decrypt(body["refresh_token"].as_str().unwrap())
            .unwrap();
        let payload: RefreshTokenPayload = serde_json::from_str(&decrypted).unwrap();

        assert_eq!(payload, RefreshTokenPayload::for_token(&refresh_token));
        assert_eq!(payload.access_token_id, "at-1");
        assert_eq!(payload.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn test_refresh_token_without_encryption_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut response = BearerTokenResponse::new(private_key(dir.path()), None);
        let access_token = access_token();
        response.set_refresh_token(RefreshToken::new(access_token.clone()));
        response.set_access_token(access_token);

        let err = response.body().unwrap_err();
        assert!(matches!(
            err,
            OAuthError::Fault(crate::error::Fault::Configuration { .. })
        ));
    }

    #[test]
    fn test_http_response_headers() {
        let dir = tempfile::tempdir().unwrap();
        let mut response = BearerTokenResponse::new(private_key(dir.path()), None);
        response.set_access_token(access_token());

        let http = response.generate_http_response().unwrap();
        assert_eq!(http.status(), StatusCode::OK);
        assert_eq!(http.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(http.headers().get(header::PRAGMA).unwrap(), "no-cache");
        assert_eq!(
            http.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
