//! Session lifecycle tests against a mock platform API.
//!
//! These tests use wiremock to simulate the auth and resource endpoints and
//! check boot validation, login, registration, logout, and forced logout.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use learnhub_core::auth::{CredentialStore, MemoryCredentialStore, SessionError, SessionStatus};
use learnhub_core::models::Role;
use learnhub_core::GatewayError;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Boot
// ============================================================================

#[tokio::test]
async fn test_restore_valid_token() {
    let server = MockServer::start().await;
    mount_profile(&server, "stored-token").await;

    let store = Arc::new(MemoryCredentialStore::with_token("stored-token"));
    let manager = manager(&server, store.clone());

    assert_eq!(manager.restore().await, SessionStatus::Authenticated);

    let profile = manager.session().profile().unwrap();
    assert_eq!(profile.id, 7);
    assert_eq!(profile.name, "Ada Lovelace");
    assert_eq!(profile.email, EMAIL);
    assert_eq!(profile.role, Role::Student);
    assert_eq!(manager.session().token().as_deref(), Some("stored-token"));
    assert_eq!(store.load().unwrap().as_deref(), Some("stored-token"));
    assert!(manager.poller().is_running());

    manager.logout();
}

#[tokio::test]
async fn test_restore_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .and(header("authorization", "Bearer expired-abc"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expired" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::with_token("expired-abc"));
    let manager = manager(&server, store.clone());

    assert_eq!(manager.restore().await, SessionStatus::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
    assert!(manager.session().token().is_none());
    assert!(manager.session().profile().is_none());
    assert!(!manager.poller().is_running());
}

#[tokio::test]
async fn test_restore_without_token_makes_no_requests() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = manager(&server, store.clone());

    assert_eq!(manager.restore().await, SessionStatus::Unauthenticated);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(store.saves(), 0);
}

/// Store whose backend is unavailable.
struct UnreadableStore;

impl CredentialStore for UnreadableStore {
    fn load(&self) -> anyhow::Result<Option<String>> {
        Err(anyhow::anyhow!("keychain locked"))
    }

    fn save(&self, _token: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("keychain locked"))
    }

    fn clear(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_restore_with_unreadable_store_starts_logged_out() {
    let server = MockServer::start().await;
    let manager = manager_with_store(&server, Arc::new(UnreadableStore), Duration::from_secs(60));

    assert_eq!(manager.restore().await, SessionStatus::Unauthenticated);
    assert!(manager.session().token().is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!manager.poller().is_running());
}

#[tokio::test]
async fn test_restore_server_error_clears_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::with_token("stored-token"));
    let manager = manager(&server, store.clone());

    assert_eq!(manager.restore().await, SessionStatus::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_success() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = logged_in(&server, store.clone()).await;

    let snapshot = manager.session().snapshot();
    assert_eq!(snapshot.status(), SessionStatus::Authenticated);
    assert_eq!(snapshot.token(), Some(TOKEN));
    assert_eq!(snapshot.profile().unwrap().email, EMAIL);
    assert_eq!(store.load().unwrap().as_deref(), Some(TOKEN));
    assert_eq!(store.saves(), 1);

    manager.logout();
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": EMAIL, "password": "wrongpass" })))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = manager(&server, store.clone());

    let err = manager.login(EMAIL, "wrongpass").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert!(matches!(
        err,
        SessionError::Gateway(GatewayError::Authentication(_))
    ));
    assert_eq!(manager.session().status(), SessionStatus::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn test_login_profile_failure_clears_token() {
    let server = MockServer::start().await;
    mount_login(&server, PASSWORD, TOKEN).await;
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "db down" })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = manager(&server, store.clone());

    let err = manager.login(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.to_string(), "Server error: db down");
    assert_eq!(manager.session().status(), SessionStatus::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_newer_login_wins() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": EMAIL, "password": "first" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "tok-first" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_login(&server, "second", "tok-second").await;
    mount_profile(&server, "tok-first").await;
    mount_profile(&server, "tok-second").await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = manager(&server, store.clone());

    let (first, second) = tokio::join!(
        manager.login(EMAIL, "first"),
        manager.login(EMAIL, "second")
    );

    assert!(first.unwrap_err().is_superseded());
    assert!(second.is_ok());
    assert_eq!(manager.session().status(), SessionStatus::Authenticated);
    assert_eq!(manager.session().token().as_deref(), Some("tok-second"));
    assert_eq!(store.load().unwrap().as_deref(), Some("tok-second"));

    manager.logout();
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_does_not_log_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(json!({ "name": "Ada", "email": EMAIL, "password": PASSWORD })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "message": "User registered successfully" })),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = manager(&server, store.clone());
    manager.restore().await;

    let message = manager.register("Ada", EMAIL, PASSWORD).await.unwrap();
    assert_eq!(message, "User registered successfully");
    assert_eq!(manager.session().status(), SessionStatus::Unauthenticated);
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn test_register_conflict_is_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Email already exists" })),
        )
        .mount(&server)
        .await;

    let manager = manager(&server, Arc::new(MemoryCredentialStore::new()));
    manager.restore().await;

    let err = manager.register("Ada", EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.to_string(), "Email already exists");
    assert!(matches!(
        err,
        SessionError::Gateway(GatewayError::Validation { status: 400, .. })
    ));
    assert_eq!(manager.session().status(), SessionStatus::Unauthenticated);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_is_idempotent() {
    let server = MockServer::start().await;
    mount_unread_count(&server, 2).await;
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = logged_in(&server, store.clone()).await;
    assert!(manager.poller().is_running());

    assert!(manager.logout());
    assert!(!manager.logout());

    assert_eq!(manager.session().status(), SessionStatus::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
    assert!(!manager.poller().is_running());
    assert_eq!(manager.poller().unread_count(), 0);
}

#[tokio::test]
async fn test_concurrent_unauthorized_responses_log_out_once() {
    let server = MockServer::start().await;
    mount_unread_count(&server, 0).await;
    Mock::given(method("GET"))
        .and(path("/api/courses"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expired" })),
        )
        .expect(3)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = logged_in(&server, store.clone()).await;
    let resources = manager.resources();

    let (a, b, c) = tokio::join!(resources.courses(), resources.courses(), resources.courses());

    for result in [a, b, c] {
        assert!(result.unwrap_err().is_authentication());
    }
    assert_eq!(store.clears(), 1);
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(manager.session().status(), SessionStatus::Unauthenticated);
    assert!(manager.session().token().is_none());
    assert!(!manager.poller().is_running());
}

#[tokio::test]
async fn test_stale_unauthorized_response_keeps_new_session() {
    let server = MockServer::start().await;
    mount_unread_count(&server, 0).await;
    mount_login(&server, "second", "tok-second").await;
    mount_profile(&server, "tok-second").await;
    Mock::given(method("GET"))
        .and(path("/api/enrollments"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "Token expired" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = logged_in(&server, store.clone()).await;

    let (stale, relogin) = tokio::join!(manager.resources().enrollments(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.login(EMAIL, "second").await
    });

    assert!(stale.unwrap_err().is_authentication());
    assert!(relogin.is_ok());
    assert_eq!(manager.session().status(), SessionStatus::Authenticated);
    assert_eq!(store.load().unwrap().as_deref(), Some("tok-second"));

    manager.logout();
}

#[tokio::test]
async fn test_unauthorized_response_during_relogin_keeps_new_session() {
    let server = MockServer::start().await;
    mount_unread_count(&server, 0).await;
    mount_profile(&server, "tok-second").await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": EMAIL, "password": "second" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "tok-second" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/enrollments"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "Token expired" }))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let manager = logged_in(&server, store.clone()).await;

    // The old token is rejected while the new login is still in flight
    let (expired, relogin) = tokio::join!(manager.resources().enrollments(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.login(EMAIL, "second").await
    });

    assert!(expired.unwrap_err().is_authentication());
    assert!(relogin.is_ok(), "relogin = {:?}", relogin);
    assert_eq!(manager.session().status(), SessionStatus::Authenticated);
    assert_eq!(manager.session().token().as_deref(), Some("tok-second"));
    assert_eq!(store.load().unwrap().as_deref(), Some("tok-second"));

    manager.logout();
}
