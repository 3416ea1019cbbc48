//! Integration tests for the auth flow: register, login, profile,
//! admin invite token, and rate limiting.

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Helper: start the server on a random port and return the base URL.
async fn start_test_server() -> (String, SocketAddr) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = taskhub_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = taskhub_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");
    let message_key = taskhub_server::crypto::load_or_generate_message_key(&data_dir)
        .expect("Failed to generate message key");

    let state = taskhub_server::state::AppState {
        db,
        jwt_secret,
        message_key,
        connections: taskhub_server::ws::new_connection_registry(),
        presence: Arc::new(taskhub_server::ws::presence::PresenceRegistry::new()),
        admin_invite_token: Some("test-admin-token".to_string()),
        data_dir: data_dir.clone(),
    };

    let app = taskhub_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr)
}

#[tokio::test]
async fn test_register_login_profile_roundtrip() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({
            "name": "Maya",
            "email": "Maya@Example.COM",
            "password": "secret99",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    // Email is normalized and the password hash never leaves the server
    assert_eq!(body["data"]["email"], "maya@example.com");
    assert_eq!(body["data"]["role"], "member");
    assert!(body["data"]["password"].is_null());
    assert!(body["data"]["passwordHash"].is_null());
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&json!({ "email": "maya@example.com", "password": "secret99" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["data"]["lastLogin"].is_string());

    let resp = client
        .get(format!("{}/api/auth/profile", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let profile: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(profile["name"], "Maya");
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    for expected in [201, 409] {
        let resp = client
            .post(format!("{}/api/auth/register", base_url))
            .json(&json!({
                "name": "First",
                "email": "dup@example.com",
                "password": "secret99",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), expected);
    }
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({
            "name": "Casey",
            "email": "casey@example.com",
            "password": "secret99",
        }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&json!({ "email": "casey@example.com", "password": "wrong-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&json!({ "email": "nobody@example.com", "password": "secret99" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_register_validation() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    // Bad email
    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({ "name": "Pat", "email": "not-an-email", "password": "secret99" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Short password
    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({ "name": "Pat", "email": "pat@example.com", "password": "abc" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_admin_invite_token_grants_admin() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({
            "name": "Root",
            "email": "root@example.com",
            "password": "secret99",
            "adminInviteToken": "test-admin-token",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "admin");

    // Wrong token silently falls back to member
    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({
            "name": "Wannabe",
            "email": "wannabe@example.com",
            "password": "secret99",
            "adminInviteToken": "guessed-token",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "member");
}

#[tokio::test]
async fn test_profile_update_reissues_token() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({
            "name": "Robin",
            "email": "robin@example.com",
            "password": "secret99",
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let resp = client
        .put(format!("{}/api/auth/profile", base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Robin Q" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Robin Q");
    assert!(body["data"]["token"].is_string());
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/auth/profile", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/api/auth/profile", base_url))
        .bearer_auth("garbage-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_image_upload_roundtrip() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({
            "name": "Uploader",
            "email": "uploader@example.com",
            "password": "secret99",
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let png_bytes: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-payload";
    let part = reqwest::multipart::Part::bytes(png_bytes.to_vec())
        .file_name("avatar.png")
        .mime_str("image/png")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("profileImage", part);

    let resp = client
        .post(format!("{}/api/auth/upload-image", base_url))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let image_url = body["data"]["imageUrl"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/uploads/"));

    // Stored file is served back byte-identical
    let resp = client
        .get(format!("{}{}", base_url, image_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "image/png"
    );
    let served = resp.bytes().await.unwrap();
    assert_eq!(served.as_ref(), png_bytes);

    // Non-image extension rejected
    let part = reqwest::multipart::Part::bytes(b"#!/bin/sh".to_vec())
        .file_name("script.sh")
        .mime_str("text/plain")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("profileImage", part);
    let resp = client
        .post(format!("{}/api/auth/upload-image", base_url))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_credential_endpoints_rate_limited() {
    let (base_url, _addr) = start_test_server().await;
    let client = reqwest::Client::new();

    // Burst of 5 allowed, the 6th rapid attempt is throttled
    for _ in 0..5 {
        let resp = client
            .post(format!("{}/api/auth/login", base_url))
            .json(&json!({ "email": "x@example.com", "password": "nope99" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    }

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&json!({ "email": "x@example.com", "password": "nope99" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
}
