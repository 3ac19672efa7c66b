#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use learnhub_core::auth::{CredentialStore, MemoryCredentialStore, Session, SessionManager};
use learnhub_core::Gateway;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "correct";
pub const TOKEN: &str = "tok123";

pub fn profile_json() -> Value {
    json!({
        "id": 7,
        "name": "Ada Lovelace",
        "email": EMAIL,
        "role": "student"
    })
}

/// Session manager talking to `server`, with a long poll interval so only
/// the immediate first poll happens.
pub fn manager(server: &MockServer, store: Arc<MemoryCredentialStore>) -> SessionManager {
    manager_with_interval(server, store, Duration::from_secs(60))
}

pub fn manager_with_interval(
    server: &MockServer,
    store: Arc<MemoryCredentialStore>,
    interval: Duration,
) -> SessionManager {
    manager_with_store(server, store, interval)
}

pub fn manager_with_store(
    server: &MockServer,
    store: Arc<dyn CredentialStore>,
    interval: Duration,
) -> SessionManager {
    let session = Session::new(store);
    let gateway = Gateway::new(&server.uri(), Duration::from_secs(5), session).unwrap();
    SessionManager::new(gateway, interval)
}

pub async fn mount_login(server: &MockServer, password: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": EMAIL, "password": password })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": token })))
        .mount(server)
        .await;
}

pub async fn mount_profile(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
        .mount(server)
        .await;
}

pub async fn mount_unread_count(server: &MockServer, count: u64) {
    Mock::given(method("GET"))
        .and(path("/api/notifications/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unread_count": count })))
        .mount(server)
        .await;
}

/// Log in with `TOKEN` against a server that accepts it.
pub async fn logged_in(server: &MockServer, store: Arc<MemoryCredentialStore>) -> SessionManager {
    mount_login(server, PASSWORD, TOKEN).await;
    mount_profile(server, TOKEN).await;
    let manager = manager(server, store);
    manager.login(EMAIL, PASSWORD).await.unwrap();
    manager
}

/// Requests the server received for `request_path`.
pub async fn requests_to(server: &MockServer, request_path: &str) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == request_path)
        .collect()
}
