// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Device-flow and session-exchange tests against a mock OAuth/API server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use copilot_chat::auth::{DeviceFlow, SessionToken, SessionTokenManager};
use copilot_chat::error::AuthError;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn flow_for(server: &MockServer) -> DeviceFlow {
    DeviceFlow::with_endpoints(
        format!("{}/login/device/code", server.uri()),
        format!("{}/login/oauth/access_token", server.uri()),
    )
    .persist_on_success(false)
}

async fn mock_device_code(server: &MockServer, interval: u64, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path("/login/device/code"))
        .and(body_string_contains("client_id="))
        .and(body_string_contains("scope=read%3Auser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-123",
            "user_code": "ABCD-1234",
            "verification_uri": "https://github.com/login/device",
            "expires_in": expires_in,
            "interval": interval,
        })))
        .mount(server)
        .await;
}

async fn mock_token_poll_once(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

async fn mock_token_poll(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(body_string_contains("device_code=dev-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_device_flow_success_after_pending() {
    init_tracing();
    let server = MockServer::start().await;
    mock_device_code(&server, 0, 10).await;
    // First poll is still pending, second hands out the token.
    mock_token_poll_once(&server, json!({ "error": "authorization_pending" })).await;
    mock_token_poll(&server, json!({ "access_token": "gho_fresh" })).await;

    let mut code_callbacks = 0;
    let mut seen_code = String::new();
    let token = flow_for(&server)
        .authenticate(
            |auth| {
                code_callbacks += 1;
                seen_code = auth.user_code.clone();
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(token, "gho_fresh");
    assert_eq!(code_callbacks, 1);
    assert_eq!(seen_code, "ABCD-1234");
}

#[tokio::test]
async fn test_device_flow_slow_down_backs_off_and_still_succeeds() {
    init_tracing();
    let server = MockServer::start().await;
    mock_device_code(&server, 0, 30).await;
    mock_token_poll_once(&server, json!({ "error": "slow_down" })).await;
    mock_token_poll(&server, json!({ "access_token": "gho_patient" })).await;

    let started = Instant::now();
    let token = flow_for(&server)
        .authenticate(|_| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(token, "gho_patient");
    // The slow_down response must have added 5s to the poll interval.
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test]
async fn test_device_flow_access_denied() {
    let server = MockServer::start().await;
    mock_device_code(&server, 0, 10).await;
    mock_token_poll(&server, json!({ "error": "access_denied" })).await;

    let result = flow_for(&server)
        .authenticate(|_| {}, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(AuthError::Denied)));
}

#[tokio::test]
async fn test_device_flow_expired_token() {
    let server = MockServer::start().await;
    mock_device_code(&server, 0, 10).await;
    mock_token_poll(&server, json!({ "error": "expired_token" })).await;

    let result = flow_for(&server)
        .authenticate(|_| {}, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(AuthError::Expired)));
}

#[tokio::test]
async fn test_device_flow_deadline_expires_while_pending() {
    let server = MockServer::start().await;
    mock_device_code(&server, 1, 1).await;
    mock_token_poll(&server, json!({ "error": "authorization_pending" })).await;

    let result = flow_for(&server)
        .authenticate(|_| {}, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(AuthError::Expired)));
}

#[tokio::test]
async fn test_device_flow_unknown_error_code_is_surfaced() {
    let server = MockServer::start().await;
    mock_device_code(&server, 0, 10).await;
    mock_token_poll(&server, json!({ "error": "unsupported_grant_type" })).await;

    let result = flow_for(&server)
        .authenticate(|_| {}, &CancellationToken::new())
        .await;
    match result {
        Err(AuthError::Other(code)) => assert_eq!(code, "unsupported_grant_type"),
        other => panic!("expected Other, got {:?}", other),
    }
}

#[tokio::test]
async fn test_device_flow_cancel_during_sleep_returns_promptly() {
    let server = MockServer::start().await;
    // Long poll interval: the flow spends its time sleeping.
    mock_device_code(&server, 30, 900).await;
    mock_token_poll(&server, json!({ "error": "authorization_pending" })).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = flow_for(&server).authenticate(|_| {}, &cancel).await;

    assert!(matches!(result, Err(AuthError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_device_flow_server_error_on_device_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/device/code"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = flow_for(&server)
        .authenticate(|_| {}, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(AuthError::Network(_))));
}

// ===== Session token exchange =====

const EXCHANGE_PATH: &str = "/copilot_internal/v2/token";

fn manager_for(server: &MockServer) -> SessionTokenManager {
    SessionTokenManager::with_exchange_url(format!("{}{}", server.uri(), EXCHANGE_PATH))
}

fn exchange_body() -> serde_json::Value {
    json!({
        "token": "sess_fresh",
        "expires_at": chrono::Utc::now().timestamp() + 1800,
        "endpoints": { "api": "https://api.example.com" }
    })
}

fn valid_session_token() -> SessionToken {
    SessionToken {
        token: "sess_cached".to_string(),
        api_endpoint: "https://api.example.com".to_string(),
        expires_at: chrono::Utc::now().timestamp() + 3600,
    }
}

#[tokio::test]
async fn test_cached_valid_token_issues_no_network_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(exchange_body()))
        .expect(0)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    manager.seed(valid_session_token()).await;

    let token = manager.ensure_valid("gho_abc").await.unwrap();
    assert_eq!(token.token, "sess_cached");
    server.verify().await;
}

#[tokio::test]
async fn test_expired_cache_triggers_exactly_one_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_PATH))
        .and(header("Authorization", "token gho_abc"))
        .and(header("Copilot-Integration-Id", "vscode-chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(exchange_body()))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    manager
        .seed(SessionToken {
            token: "sess_stale".to_string(),
            api_endpoint: "https://api.example.com".to_string(),
            // 30s remaining falls inside the 60s safety buffer.
            expires_at: chrono::Utc::now().timestamp() + 30,
        })
        .await;

    let token = manager.ensure_valid("gho_abc").await.unwrap();
    assert_eq!(token.token, "sess_fresh");
    server.verify().await;
}

#[tokio::test]
async fn test_single_flight_ten_concurrent_callers_one_exchange() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                // Delay keeps the exchange in flight while the other nine
                // callers pile up behind the guard.
                .set_delay(Duration::from_millis(200))
                .set_body_json(exchange_body()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(manager_for(&server));
    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(
            async move { manager.ensure_valid("gho_abc").await },
        ));
    }

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.token, "sess_fresh");
    }
    server.verify().await;
}

#[tokio::test]
async fn test_failed_exchange_releases_guard_for_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(exchange_body()))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    assert!(manager.ensure_valid("gho_abc").await.is_err());

    // The failure must not leave later callers blocked or poisoned.
    let token = manager.ensure_valid("gho_abc").await.unwrap();
    assert_eq!(token.token, "sess_fresh");
}

#[tokio::test]
async fn test_exchange_401_maps_to_invalid_or_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = manager_for(&server).ensure_valid("gho_bad").await;
    assert!(matches!(result, Err(AuthError::InvalidOrExpired)));
}

#[tokio::test]
async fn test_exchange_403_maps_to_access_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_PATH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = manager_for(&server).ensure_valid("gho_abc").await;
    assert!(matches!(result, Err(AuthError::AccessDenied)));
}

#[tokio::test]
async fn test_exchange_other_status_is_reported_with_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    match manager_for(&server).ensure_valid("gho_abc").await {
        Err(AuthError::Other(message)) => {
            assert!(message.contains("503"));
            assert!(message.contains("try later"));
        }
        other => panic!("expected Other, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exchange_missing_endpoint_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EXCHANGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "sess_fresh",
            "expires_at": 1999999999_i64
        })))
        .mount(&server)
        .await;

    let result = manager_for(&server).ensure_valid("gho_abc").await;
    assert!(matches!(result, Err(AuthError::MalformedResponse(_))));
}
