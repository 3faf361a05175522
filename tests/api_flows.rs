//! End-to-end request flows driven through the router without a socket

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};

use pqc_messenger::config::Args;
use pqc_messenger::db::MemoryStore;
use pqc_messenger::pqc::{AlgorithmId, PqcProvider, PqcleanProvider, DILITHIUM2};
use pqc_messenger::server::{dispatch, AppState};

// =============================================================================
// Harness
// =============================================================================

fn state_with(extra: &[&str]) -> Arc<AppState> {
    let mut argv = vec![
        "pqc-messenger",
        "--dev-mode",
        "--argon2-memory-kib",
        "64",
        "--argon2-iterations",
        "1",
    ];
    argv.extend_from_slice(extra);
    let args = Args::try_parse_from(argv).unwrap();
    Arc::new(AppState::new(args, Arc::new(MemoryStore::new()), "memory").unwrap())
}

fn state() -> Arc<AppState> {
    state_with(&[])
}

async fn call(
    state: &Arc<AppState>,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let payload = body.map(|b| b.to_string()).unwrap_or_default();
    let req = builder.body(Full::new(Bytes::from(payload))).unwrap();

    let response = dispatch(state.clone(), req).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(state: &Arc<AppState>, email: &str, on_device: bool) -> Value {
    let (status, body) = call(
        state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": "correct horse battery staple",
            "display_name": "Tester",
            "generate_on_device": on_device,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body
}

fn str_field<'a>(body: &'a Value, field: &str) -> &'a str {
    body[field].as_str().unwrap()
}

// =============================================================================
// Identity
// =============================================================================

#[tokio::test]
async fn test_register_returns_server_custodied_key() {
    let state = state();
    let body = register(&state, "alice@example.com", false).await;

    assert!(!str_field(&body, "user_id").is_empty());
    assert!(!str_field(&body, "auth_token").is_empty());
    let key_id = str_field(&body, "key_id");

    let (status, key) = call(&state, Method::GET, &format!("/api/keys/{key_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(key["custody"], "server");
    assert_eq!(key["owner_id"], body["user_id"]);
    assert_eq!(key["public_key"], body["public_key"]);
    assert!(key.get("private_key").is_none());
    assert!(key.get("sealed_private_key").is_none());
}

#[tokio::test]
async fn test_register_on_device_has_no_key() {
    let state = state();
    let body = register(&state, "device@example.com", true).await;
    assert!(body["key_id"].is_null());
    assert!(body["public_key"].is_null());
}

#[tokio::test]
async fn test_duplicate_email_differs_only_in_case() {
    let state = state();
    register(&state, "bob@example.com", false).await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "email": "  BOB@Example.com ",
            "password": "another",
            "display_name": "Bob Two",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A user with this email already exists.");
}

#[tokio::test]
async fn test_concurrent_registration_same_email() {
    let state = state();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            call(
                &state,
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "email": "race@example.com",
                    "password": "pw",
                    "display_name": "Racer",
                    "generate_on_device": true,
                })),
            )
            .await
            .0
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let state = state();
    register(&state, "carol@example.com", true).await;

    let (wrong_status, wrong_body) = call(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "carol@example.com", "password": "nope" })),
    )
    .await;
    let (unknown_status, unknown_body) = call(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "nope" })),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn test_login_issues_working_session() {
    let state = state();
    register(&state, "dave@example.com", true).await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "DAVE@example.com", "password": "correct horse battery staple" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_profile"]["email"], "dave@example.com");

    let token = str_field(&body, "auth_token");
    let (status, me) = call(&state, Method::GET, "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["display_name"], "Tester");
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let state = state();
    let reg = register(&state, "erin@example.com", true).await;
    let token = str_field(&reg, "auth_token");

    let (status, _) = call(&state, Method::POST, "/api/auth/logout", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&state, Method::GET, "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_expires_after_ttl() {
    let state = state_with(&["--session-ttl-seconds", "1"]);
    let reg = register(&state, "frank@example.com", true).await;
    let token = str_field(&reg, "auth_token").to_string();

    let (status, _) = call(&state, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let (status, _) = call(&state, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Keys
// =============================================================================

#[tokio::test]
async fn test_generate_with_invalid_token() {
    let state = state();
    let (status, body) = call(
        &state,
        Method::POST,
        "/api/keys/generate",
        None,
        Some(json!({ "auth_token": "not-a-session" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired auth token.");
}

#[tokio::test]
async fn test_generate_on_device_is_rejected() {
    let state = state();
    let reg = register(&state, "gina@example.com", true).await;
    let (status, _) = call(
        &state,
        Method::POST,
        "/api/keys/generate",
        Some(str_field(&reg, "auth_token")),
        Some(json!({ "generate_on_device": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unavailable_algorithm_is_server_error() {
    let state = state_with(&["--signature-algorithms", "ML-DSA-65"]);

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "email": "hank@example.com",
            "password": "pw",
            "display_name": "Hank",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "ALGORITHM_UNAVAILABLE");

    // The failed attempt must not have claimed the email
    register(&state, "hank@example.com", true).await;
}

#[tokio::test]
async fn test_unknown_key_lookup() {
    let state = state();
    let (status, _) = call(&state, Method::GET, "/api/keys/does-not-exist", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Messages
// =============================================================================

#[tokio::test]
async fn test_server_signs_when_signature_absent() {
    let state = state();
    let alice = register(&state, "a@example.com", false).await;
    let bob = register(&state, "b@example.com", true).await;
    let token = str_field(&alice, "auth_token");

    let (status, receipt) = call(
        &state,
        Method::POST,
        "/api/messages/send",
        Some(token),
        Some(json!({
            "recipient_id": bob["user_id"],
            "message_body": "hello",
            "public_key_id": alice["key_id"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["signature_valid"], true);

    // Visible to the recipient, with the verdict recorded
    let path = format!("/api/messages/{}", str_field(&receipt, "message_id"));
    let (status, message) = call(&state, Method::GET, &path, Some(str_field(&bob, "auth_token")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message["message_body"], "hello");
    assert_eq!(message["signature_valid"], true);
    assert_eq!(message["sender_id"], alice["user_id"]);
}

#[tokio::test]
async fn test_corrupted_signature_is_stored_as_invalid() {
    let state = state();
    let alice = register(&state, "c@example.com", false).await;
    let token = str_field(&alice, "auth_token");

    let (_, first) = call(
        &state,
        Method::POST,
        "/api/messages/send",
        Some(token),
        Some(json!({
            "recipient_id": "someone",
            "message_body": "original",
            "public_key_id": alice["key_id"],
        })),
    )
    .await;
    let path = format!("/api/messages/{}", str_field(&first, "message_id"));
    let (_, stored) = call(&state, Method::GET, &path, Some(token), None).await;

    // Reuse a genuine signature over a different body
    let (status, receipt) = call(
        &state,
        Method::POST,
        "/api/messages/send",
        Some(token),
        Some(json!({
            "recipient_id": "someone",
            "message_body": "tampered",
            "public_key_id": alice["key_id"],
            "signature": stored["signature"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["signature_valid"], false);
}

#[tokio::test]
async fn test_server_will_not_sign_with_someone_elses_key() {
    let state = state();
    let alice = register(&state, "owner@example.com", false).await;
    let mallory = register(&state, "mallory@example.com", true).await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/messages/send",
        Some(str_field(&mallory, "auth_token")),
        Some(json!({
            "recipient_id": mallory["user_id"],
            "message_body": "I, Alice, transfer everything to Mallory",
            "public_key_id": alice["key_id"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    // The owner can still send unsigned with the same key
    let (status, receipt) = call(
        &state,
        Method::POST,
        "/api/messages/send",
        Some(str_field(&alice, "auth_token")),
        Some(json!({
            "recipient_id": mallory["user_id"],
            "message_body": "hello",
            "public_key_id": alice["key_id"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["signature_valid"], true);
}

#[tokio::test]
async fn test_send_with_unknown_key() {
    let state = state();
    let alice = register(&state, "d@example.com", false).await;
    let (status, body) = call(
        &state,
        Method::POST,
        "/api/messages/send",
        Some(str_field(&alice, "auth_token")),
        Some(json!({
            "recipient_id": "someone",
            "message_body": "hi",
            "public_key_id": "missing",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Unknown public_key_id.");
}

#[tokio::test]
async fn test_device_key_flow() {
    let state = state();
    let user = register(&state, "e@example.com", true).await;
    let token = str_field(&user, "auth_token");

    let provider = PqcleanProvider;
    let algorithm = AlgorithmId::from(DILITHIUM2);
    let pair = provider.generate_keypair(&algorithm).unwrap();

    let (status, key) = call(
        &state,
        Method::POST,
        "/api/keys/device",
        Some(token),
        Some(json!({
            "algorithm": DILITHIUM2,
            "public_key": BASE64.encode(&pair.public_key),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(key["custody"], "device");
    let key_id = key["key_id"].clone();

    // No server-side private key to fall back on
    let (status, body) = call(
        &state,
        Method::POST,
        "/api/messages/send",
        Some(token),
        Some(json!({
            "recipient_id": "someone",
            "message_body": "signed on device",
            "public_key_id": key_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Signature required for client-managed key.");

    let signature = provider
        .sign(&algorithm, &pair.private_key, b"signed on device")
        .unwrap();
    let (status, receipt) = call(
        &state,
        Method::POST,
        "/api/messages/send",
        Some(token),
        Some(json!({
            "recipient_id": "someone",
            "message_body": "signed on device",
            "public_key_id": key_id,
            "signature": BASE64.encode(&signature),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["signature_valid"], true);
}

#[tokio::test]
async fn test_message_hidden_from_third_party() {
    let state = state();
    let alice = register(&state, "f@example.com", false).await;
    let eve = register(&state, "eve@example.com", true).await;

    let (_, receipt) = call(
        &state,
        Method::POST,
        "/api/messages/send",
        Some(str_field(&alice, "auth_token")),
        Some(json!({
            "recipient_id": "someone-else",
            "message_body": "private",
            "public_key_id": alice["key_id"],
        })),
    )
    .await;

    let path = format!("/api/messages/{}", str_field(&receipt, "message_id"));
    let (status, _) = call(&state, Method::GET, &path, Some(str_field(&eve, "auth_token")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Plumbing
// =============================================================================

#[tokio::test]
async fn test_healthz_body() {
    let state = state();
    let (status, body) = call(&state, Method::GET, "/api/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_version_reports_negotiated_algorithm() {
    let state = state();
    let (status, body) = call(&state, Method::GET, "/api/version", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "memory");
    assert!(body["signature_algorithm"].is_string());
}

#[tokio::test]
async fn test_unknown_route() {
    let state = state();
    let (status, body) = call(&state, Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let state = state();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .body(Full::new(Bytes::from_static(b"{not json")))
        .unwrap();
    let response = dispatch(state, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let state = state_with(&["--max-body-bytes", "32"]);
    let (status, _) = call(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "x".repeat(64), "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cors_only_for_allowed_origins() {
    let state = state();

    let allowed = Request::builder()
        .method(Method::GET)
        .uri("/api/healthz")
        .header("Origin", "http://localhost:8000")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = dispatch(state.clone(), allowed).await;
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:8000"
    );

    let blocked = Request::builder()
        .method(Method::GET)
        .uri("/api/healthz")
        .header("Origin", "https://evil.example")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = dispatch(state, blocked).await;
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_preflight() {
    let state = state();
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/messages/send")
        .header("Origin", "http://127.0.0.1:8000")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = dispatch(state, req).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().get("access-control-allow-methods").is_some());
}
