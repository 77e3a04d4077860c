//! Refresh token rotation.

mod common;

use axum::http::StatusCode;
use oauth_server::prelude::*;
use oauth_server::response_type::RefreshTokenPayload;
use time::Duration;

use common::*;

fn server_with(harness: &Harness, refresh_token_ttl: Duration) -> AuthorizationServer {
    let mut password = PasswordGrant::new(harness.users.clone(), harness.refresh_tokens.clone());
    password.set_refresh_token_ttl(refresh_token_ttl).unwrap();

    let mut server = harness.server();
    server.enable_grant_type(password, None);
    server.enable_grant_type(RefreshTokenGrant::new(harness.refresh_tokens.clone()), None);
    server
}

fn server(harness: &Harness) -> AuthorizationServer {
    server_with(harness, Duration::days(30))
}

/// Logs in as alice through the password grant and returns the token body.
///
/// Public clients ignore the secret.
async fn login(server: &AuthorizationServer, client_id: &str, scope: &str) -> serde_json::Value {
    let request = RequestParams::new()
        .with_body("grant_type", "password")
        .with_body("client_id", client_id)
        .with_body("client_secret", WEB_SECRET)
        .with_body("username", "alice")
        .with_body("password", "wonderland")
        .with_body("scope", scope);
    json_body(server.respond_to_access_token_request(&request).await.unwrap()).await
}

fn refresh_request(client_id: &str, refresh_token: &str) -> RequestParams {
    RequestParams::new()
        .with_body("grant_type", "refresh_token")
        .with_body("client_id", client_id)
        .with_body("refresh_token", refresh_token)
}

fn payload(harness: &Harness, refresh_token: &str) -> RefreshTokenPayload {
    serde_json::from_str(&harness.encryption_key.decrypt(refresh_token).unwrap()).unwrap()
}

#[tokio::test]
async fn test_rotation_revokes_the_old_pair() {
    let harness = Harness::new();
    let server = server(&harness);

    let first = login(&server, "spa", "read write").await;
    let old_refresh = first["refresh_token"].as_str().unwrap();
    let old = payload(&harness, old_refresh);
    assert_eq!(old.client_id, "spa");
    assert_eq!(old.user_id.as_deref(), Some("user-alice"));

    let response = server
        .respond_to_access_token_request(&refresh_request("spa", old_refresh))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second = json_body(response).await;

    let claims = verify_jwt(second["access_token"].as_str().unwrap(), "spa");
    assert_eq!(claims["sub"], "user-alice");
    assert_eq!(claims["scopes"], serde_json::json!(["read", "write"]));

    let new = payload(&harness, second["refresh_token"].as_str().unwrap());
    assert_ne!(new.refresh_token_id, old.refresh_token_id);
    assert_eq!(new.access_token_id, claims["jti"].as_str().unwrap());

    assert!(harness.access_tokens.is_revoked(&old.access_token_id));
    assert!(harness.refresh_tokens.is_revoked(&old.refresh_token_id));
    assert!(!harness.refresh_tokens.is_revoked(&new.refresh_token_id));
    assert_eq!(harness.refresh_tokens.len(), 2);
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let harness = Harness::new();
    let server = server(&harness);

    let first = login(&server, "spa", "read").await;
    let old_refresh = first["refresh_token"].as_str().unwrap();
    server
        .respond_to_access_token_request(&refresh_request("spa", old_refresh))
        .await
        .unwrap();

    let err = protocol(
        server
            .respond_to_access_token_request(&refresh_request("spa", old_refresh))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.error_type(), ErrorType::InvalidRequest);
    assert_eq!(err.http_status(), 401);
    assert_eq!(err.hint(), Some("Token has been revoked"));
}

#[tokio::test]
async fn test_scopes_can_be_narrowed() {
    let harness = Harness::new();
    let server = server(&harness);

    let first = login(&server, "spa", "read write").await;
    let request = refresh_request("spa", first["refresh_token"].as_str().unwrap())
        .with_body("scope", "read");
    let body = json_body(server.respond_to_access_token_request(&request).await.unwrap()).await;

    let claims = verify_jwt(body["access_token"].as_str().unwrap(), "spa");
    assert_eq!(claims["scopes"], serde_json::json!(["read"]));
    assert_eq!(
        payload(&harness, body["refresh_token"].as_str().unwrap()).scopes,
        vec!["read"]
    );
}

#[tokio::test]
async fn test_scopes_cannot_be_widened() {
    let harness = Harness::new();
    let server = server(&harness);

    let first = login(&server, "spa", "read").await;
    let old = payload(&harness, first["refresh_token"].as_str().unwrap());
    let request = refresh_request("spa", first["refresh_token"].as_str().unwrap())
        .with_body("scope", "read admin");

    let err = protocol(
        server
            .respond_to_access_token_request(&request)
            .await
            .unwrap_err(),
    );
    assert_eq!(err.error_type(), ErrorType::InvalidScope);
    assert_eq!(err.hint(), Some("Check the `admin` scope"));

    // A rejected refresh leaves the presented pair usable.
    assert!(!harness.refresh_tokens.is_revoked(&old.refresh_token_id));
    assert!(!harness.access_tokens.is_revoked(&old.access_token_id));
}

#[tokio::test]
async fn test_token_bound_to_another_client() {
    let harness = Harness::new();
    let server = server(&harness);

    let first = login(&server, "web", "read").await;
    let refresh_token = first["refresh_token"].as_str().unwrap();

    let err = protocol(
        server
            .respond_to_access_token_request(&refresh_request("spa", refresh_token))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.hint(), Some("Token is not linked to client"));
    assert_eq!(
        harness.emitter.events().last(),
        Some(&RequestEvent::RefreshTokenClientFailed)
    );
}

#[tokio::test]
async fn test_garbage_refresh_token() {
    let harness = Harness::new();
    let server = server(&harness);

    let err = protocol(
        server
            .respond_to_access_token_request(&refresh_request("spa", "definitely-not-a-token"))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.error_type(), ErrorType::InvalidRequest);
    assert_eq!(err.hint(), Some("Cannot decrypt the refresh token"));
}

#[tokio::test]
async fn test_missing_refresh_token() {
    let harness = Harness::new();
    let server = server(&harness);

    let request = RequestParams::new()
        .with_body("grant_type", "refresh_token")
        .with_body("client_id", "spa");
    let err = protocol(
        server
            .respond_to_access_token_request(&request)
            .await
            .unwrap_err(),
    );
    assert_eq!(err.hint(), Some("Check the `refresh_token` parameter"));
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn test_expired_refresh_token() {
    let harness = Harness::new();
    let server = server_with(&harness, Duration::seconds(-1));

    let first = login(&server, "spa", "read").await;
    let err = protocol(
        server
            .respond_to_access_token_request(&refresh_request(
                "spa",
                first["refresh_token"].as_str().unwrap(),
            ))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.hint(), Some("Token has expired"));
}
