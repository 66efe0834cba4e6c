//! End-to-end session lifecycle against a mock backend over real HTTP

use std::sync::Arc;
use std::time::Duration;

use livefeed_core::api::PendingRequest;
use livefeed_core::auth::StoredCredentials;
use livefeed_core::{
    AuthError, AuthState, Config, CredentialField, CredentialStore, HttpTransport,
    LoginCredentials, Session, SessionController,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

fn controller(server: &ServerGuard, store: &CredentialStore) -> SessionController {
    let config = Config {
        api_base_url: format!("{}/api", server.url()),
        ..Config::default()
    };
    let transport =
        Arc::new(HttpTransport::new(Duration::from_secs(5)).expect("Failed to build HTTP client"));
    SessionController::new(transport, store.clone(), &config)
}

async fn seed(store: &CredentialStore, access: Option<&str>, refresh: &str) {
    store
        .store_session(&Session {
            access_token: access.unwrap_or("placeholder").to_string(),
            refresh_token: refresh.to_string(),
            session_id: Some("sid-1".to_string()),
        })
        .await
        .expect("Failed to seed session");
    if access.is_none() {
        store
            .clear(&[CredentialField::AccessToken])
            .await
            .expect("Failed to clear access token");
    }
}

#[tokio::test]
async fn refresh_before_request_when_access_token_absent() {
    //* Given
    let mut server = Server::new_async().await;
    let refresh_mock = server
        .mock("POST", "/api/refresh")
        .match_body(Matcher::Json(json!({ "refreshToken": "refresh-1", "sessionId": "sid-1" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"accessToken":"fresh"}"#)
        .expect(1)
        .create_async()
        .await;
    let users_mock = server
        .mock("GET", "/api/users")
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body(r#"{"users":[{"email":"ada@example.com"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let store = CredentialStore::memory();
    seed(&store, None, "refresh-1").await;
    let controller = controller(&server, &store);

    //* When
    let users = controller.api().list_users().await.expect("Request should succeed");

    //* Then
    refresh_mock.assert_async().await;
    users_mock.assert_async().await;
    assert_eq!(users.len(), 1);
    assert_eq!(
        store.get(CredentialField::AccessToken).await.unwrap().as_deref(),
        Some("fresh")
    );
}

#[tokio::test]
async fn expired_token_refreshed_and_request_retried_once() {
    //* Given
    let mut server = Server::new_async().await;
    let stale_mock = server
        .mock("POST", "/api/twitter/like")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .with_body(r#"{"message":"Access token expired"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/api/refresh")
        .with_status(200)
        .with_body(r#"{"accessToken":"fresh"}"#)
        .expect(1)
        .create_async()
        .await;
    let fresh_mock = server
        .mock("POST", "/api/twitter/like")
        .match_header("authorization", "Bearer fresh")
        .match_body(Matcher::Json(json!({ "tweetId": "42" })))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let store = CredentialStore::memory();
    seed(&store, Some("stale"), "refresh-1").await;
    let controller = controller(&server, &store);

    //* When
    controller.api().like_post("42").await.expect("Like should succeed after refresh");

    //* Then
    stale_mock.assert_async().await;
    refresh_mock.assert_async().await;
    fresh_mock.assert_async().await;
}

#[tokio::test]
async fn invalid_refresh_token_clears_session_and_logs_out() {
    //* Given
    let mut server = Server::new_async().await;
    let users_mock = server
        .mock("GET", "/api/users")
        .with_status(401)
        .with_body(r#"{"message":"Access token expired"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/api/refresh")
        .with_status(401)
        .with_body(r#"{"message":"Invalid refresh token"}"#)
        .expect(1)
        .create_async()
        .await;

    let store = CredentialStore::memory();
    seed(&store, Some("stale"), "revoked").await;
    let controller = controller(&server, &store);
    assert_eq!(controller.restore().await, AuthState::LoggedIn);

    //* When
    let result = controller
        .authenticated_request(PendingRequest::get(format!("{}/api/users", server.url())))
        .await;

    //* Then
    users_mock.assert_async().await;
    refresh_mock.assert_async().await;
    match result {
        Err(AuthError::ExpiredToken { response, .. }) => {
            assert_eq!(response.status.as_u16(), 401);
        }
        other => panic!("Expected ExpiredToken, got {:?}", other.map(|r| r.status)),
    }
    assert_eq!(controller.state(), AuthState::LoggedOut);
    assert_eq!(store.snapshot().await.unwrap(), StoredCredentials::default());
}

#[tokio::test]
async fn no_credentials_fails_without_network() {
    //* Given
    let mut server = Server::new_async().await;
    let users_mock = server
        .mock("GET", "/api/users")
        .expect(0)
        .create_async()
        .await;
    let refresh_mock = server
        .mock("POST", "/api/refresh")
        .expect(0)
        .create_async()
        .await;

    let store = CredentialStore::memory();
    let controller = controller(&server, &store);

    //* When
    let result = controller
        .authenticated_request(PendingRequest::get(format!("{}/api/users", server.url())))
        .await;

    //* Then
    users_mock.assert_async().await;
    refresh_mock.assert_async().await;
    assert!(matches!(result, Err(AuthError::MissingCredentials)));
    assert_eq!(controller.state(), AuthState::LoggedOut);
}

#[tokio::test]
async fn logout_clears_local_session_when_server_errors() {
    //* Given
    let mut server = Server::new_async().await;
    let logout_mock = server
        .mock("POST", "/api/logout")
        .match_header("authorization", "Bearer access-1")
        .with_status(500)
        .with_body(r#"{"message":"Logout failed"}"#)
        .expect(1)
        .create_async()
        .await;

    let store = CredentialStore::memory();
    seed(&store, Some("access-1"), "refresh-1").await;
    let controller = controller(&server, &store);
    controller.restore().await;

    //* When
    controller.logout().await.expect("Local logout should succeed");

    //* Then
    logout_mock.assert_async().await;
    assert!(!controller.is_logged_in());
    assert_eq!(store.snapshot().await.unwrap(), StoredCredentials::default());
}

#[tokio::test]
async fn session_survives_restart_with_file_store() {
    //* Given
    let mut server = Server::new_async().await;
    let login_mock = server
        .mock("POST", "/api/login")
        .match_body(Matcher::Json(json!({ "email": "ada@example.com", "password": "hunter2" })))
        .with_status(200)
        .with_body(
            r#"{"user":{"email":"ada@example.com","name":"Ada"},
                "accessToken":"access-1","refreshToken":"refresh-1","sessionId":"sid-1"}"#,
        )
        .expect(1)
        .create_async()
        .await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("credentials.json");

    let first_run = controller(&server, &CredentialStore::file(path.clone()));
    first_run
        .login(&LoginCredentials::new("ada@example.com", "hunter2"))
        .await
        .expect("Login should succeed");
    drop(first_run);

    //* When
    let second_run = controller(&server, &CredentialStore::file(path));
    let state = second_run.restore().await;

    //* Then
    login_mock.assert_async().await;
    assert_eq!(state, AuthState::LoggedIn);
}
