mod common;

use calendar_agent::components::google_calendar::token::{StoredCredential, TokenStore};
use calendar_agent::components::google_calendar::{CalendarClient, CredentialManager};
use calendar_agent::error::Error;
use common::{test_config, ScriptedGate};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_token(dir: &TempDir, token: serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join("token.json");
    fs::write(&path, token.to_string()).unwrap();
    path
}

#[tokio::test]
async fn test_valid_token_is_reused() {
    let dir = TempDir::new().unwrap();
    let token_path = write_token(
        &dir,
        json!({
            "token": "still-good",
            "refresh_token": "refresh-1",
            "token_uri": "http://127.0.0.1:9/token",
            "client_id": "id",
            "client_secret": "secret",
            "expiry": "2099-01-01T00:00:00Z"
        }),
    );

    let manager = CredentialManager::with_paths(&token_path, dir.path().join("credentials.json"));
    let session = manager.obtain_session().await.unwrap();

    assert_eq!(session.bearer(), "Bearer still-good");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_saved() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let token_path = write_token(
        &dir,
        json!({
            "token": "stale",
            "refresh_token": "refresh-1",
            "token_uri": format!("{}/token", server.uri()),
            "client_id": "id",
            "client_secret": "secret",
            "expiry": "2020-01-01T00:00:00Z"
        }),
    );

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = CredentialManager::with_paths(&token_path, dir.path().join("credentials.json"));
    let session = manager.obtain_session().await.unwrap();
    assert_eq!(session.bearer(), "Bearer fresh");

    // Cached in memory: no second refresh
    let again = manager.obtain_session().await.unwrap();
    assert_eq!(again.bearer(), "Bearer fresh");

    let saved: StoredCredential = TokenStore::new(&token_path).load().unwrap();
    assert_eq!(saved.token, "fresh");
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
    assert!(saved.expiry.is_some());
}

#[tokio::test]
async fn test_rejected_refresh_is_auth_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let token_path = write_token(
        &dir,
        json!({
            "token": "stale",
            "refresh_token": "revoked",
            "token_uri": format!("{}/token", server.uri()),
            "client_id": "id",
            "client_secret": "secret",
            "expiry": "2020-01-01T00:00:00Z"
        }),
    );

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
        )
        .mount(&server)
        .await;

    let manager = CredentialManager::with_paths(&token_path, dir.path().join("credentials.json"));
    match manager.obtain_session().await {
        Err(Error::Auth(message)) => assert!(message.contains("invalid_grant"), "{}", message),
        other => panic!("expected auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_client_secret_is_auth_error() {
    let dir = TempDir::new().unwrap();
    let manager = CredentialManager::with_paths(
        dir.path().join("token.json"),
        dir.path().join("credentials.json"),
    );

    assert!(matches!(
        manager.obtain_session().await,
        Err(Error::Auth(_))
    ));
}

#[tokio::test]
async fn test_calendar_calls_use_stored_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let token_path = write_token(
        &dir,
        json!({
            "token": "stored-token",
            "expiry": "2099-01-01T00:00:00Z"
        }),
    );

    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .and(header("authorization", "Bearer stored-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "primary-id", "summary": "Me", "primary": true}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(CredentialManager::with_paths(
        &token_path,
        dir.path().join("credentials.json"),
    ));
    let client = CalendarClient::new(
        &test_config(&server.uri()),
        manager,
        ScriptedGate::approving(),
    );

    let result = client.list_all_calendars().await;
    assert!(result.contains("- Name: Me (PRIMARY)"), "{}", result);
}

#[tokio::test]
async fn test_session_failure_surfaces_in_result() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let manager = Arc::new(CredentialManager::with_paths(
        dir.path().join("token.json"),
        dir.path().join("credentials.json"),
    ));
    let client = CalendarClient::new(
        &test_config(&server.uri()),
        manager,
        ScriptedGate::approving(),
    );

    let result = client.list_all_calendars().await;
    assert!(
        result.starts_with("Error listing calendars: not authorized:"),
        "{}",
        result
    );
}

#[tokio::test]
async fn test_epoch_expiry_layout_is_refreshed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let token_path = write_token(
        &dir,
        json!({
            "access_token": "stale",
            "refresh_token": "refresh-2",
            "token_uri": format!("{}/token", server.uri()),
            "client_id": "id",
            "client_secret": "secret",
            "expires_at": 1
        }),
    );

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("refresh_token=refresh-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = CredentialManager::with_paths(&token_path, dir.path().join("credentials.json"));
    let session = manager.obtain_session().await.unwrap();
    assert_eq!(session.bearer(), "Bearer renewed");

    // Rewritten in the current layout
    let saved = fs::read_to_string(&token_path).unwrap();
    assert!(saved.contains("\"token\": \"renewed\""), "{}", saved);
    assert!(!saved.contains("expires_at"));
}

#[tokio::test]
async fn test_absurd_expires_in_is_auth_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let token_path = write_token(
        &dir,
        json!({
            "token": "stale",
            "refresh_token": "refresh-3",
            "token_uri": format!("{}/token", server.uri()),
            "expiry": "2020-01-01T00:00:00Z"
        }),
    );

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed",
            "expires_in": i64::MAX
        })))
        .mount(&server)
        .await;

    let manager = CredentialManager::with_paths(&token_path, dir.path().join("credentials.json"));
    assert!(matches!(
        manager.obtain_session().await,
        Err(Error::Auth(_))
    ));
}
