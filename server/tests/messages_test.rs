//! Integration tests for message REST endpoints: send/history through the
//! at-rest encryption boundary, unseen counts, and soft deletion.

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Start the server; also returns the data dir so tests can inspect the
/// raw database file.
async fn start_test_server() -> (String, String) {
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
        admin_invite_token: None,
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

    (format!("http://{}", addr), data_dir)
}

async fn register_user(base_url: &str, name: &str, email: &str) -> (String, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({ "name": name, "email": email, "password": "secret99" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "Registration failed for {}", name);
    let body: serde_json::Value = resp.json().await.unwrap();
    (
        body["data"]["token"].as_str().unwrap().to_string(),
        body["data"]["id"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_send_and_fetch_conversation() {
    let (base_url, _data_dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let (alice_token, alice_id) = register_user(&base_url, "Alice", "alice@example.com").await;
    let (bob_token, bob_id) = register_user(&base_url, "Bob", "bob@example.com").await;

    let resp = client
        .post(format!("{}/api/messages/send/{}", base_url, bob_id))
        .bearer_auth(&alice_token)
        .json(&json!({ "text": "hello bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let sent: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(sent["text"], "hello bob");
    assert_eq!(sent["seen"], false);
    assert_eq!(sent["messageType"], "text");

    let resp = client
        .post(format!("{}/api/messages/send/{}", base_url, alice_id))
        .bearer_auth(&bob_token)
        .json(&json!({ "text": "hi alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Both directions, chronological, plaintext
    let resp = client
        .get(format!("{}/api/messages/{}", base_url, bob_id))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let messages: serde_json::Value = resp.json().await.unwrap();
    let messages = messages.as_array().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["text"], "hello bob");
    assert_eq!(messages[1]["text"], "hi alice");
}

#[tokio::test]
async fn test_message_text_is_encrypted_at_rest() {
    let (base_url, data_dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let (alice_token, _alice_id) = register_user(&base_url, "Alice", "alice@example.com").await;
    let (_bob_token, bob_id) = register_user(&base_url, "Bob", "bob@example.com").await;

    let secret_text = "the launch code is 0000";
    client
        .post(format!("{}/api/messages/send/{}", base_url, bob_id))
        .bearer_auth(&alice_token)
        .json(&json!({ "text": secret_text }))
        .send()
        .await
        .unwrap();

    // Read the stored blob straight out of SQLite: ciphertext only
    let stored: Vec<u8> = tokio::task::spawn_blocking(move || {
        let db_path = std::path::Path::new(&data_dir).join("taskhub.db");
        let conn = rusqlite::Connection::open(db_path).unwrap();
        conn.query_row("SELECT text_enc FROM messages", [], |row| row.get(0))
            .unwrap()
    })
    .await
    .unwrap();

    assert!(!stored
        .windows(secret_text.len())
        .any(|w| w == secret_text.as_bytes()));
    // nonce + ciphertext + GCM tag
    assert_eq!(stored.len(), 12 + secret_text.len() + 16);
}

#[tokio::test]
async fn test_unseen_count_tracks_receiver_side() {
    let (base_url, _data_dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let (alice_token, alice_id) = register_user(&base_url, "Alice", "alice@example.com").await;
    let (bob_token, bob_id) = register_user(&base_url, "Bob", "bob@example.com").await;

    for text in ["one", "two", "three"] {
        client
            .post(format!("{}/api/messages/send/{}", base_url, bob_id))
            .bearer_auth(&alice_token)
            .json(&json!({ "text": text }))
            .send()
            .await
            .unwrap();
    }

    // Bob has three unseen from Alice
    let resp = client
        .get(format!("{}/api/messages/unseen-count/{}", base_url, alice_id))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 3);

    // Alice has none from Bob
    let resp = client
        .get(format!("{}/api/messages/unseen-count/{}", base_url, bob_id))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_soft_delete_hides_from_history() {
    let (base_url, _data_dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let (alice_token, _alice_id) = register_user(&base_url, "Alice", "alice@example.com").await;
    let (bob_token, bob_id) = register_user(&base_url, "Bob", "bob@example.com").await;

    let resp = client
        .post(format!("{}/api/messages/send/{}", base_url, bob_id))
        .bearer_auth(&alice_token)
        .json(&json!({ "text": "delete me" }))
        .send()
        .await
        .unwrap();
    let sent: serde_json::Value = resp.json().await.unwrap();
    let message_id = sent["id"].as_str().unwrap().to_string();

    // Only the sender may delete
    let resp = client
        .delete(format!("{}/api/messages/{}", base_url, message_id))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .delete(format!("{}/api/messages/{}", base_url, message_id))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/api/messages/{}", base_url, bob_id))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    let messages: serde_json::Value = resp.json().await.unwrap();
    assert!(messages.as_array().unwrap().is_empty());

    // Deleting again 404s (already soft-deleted)
    let resp = client
        .delete(format!("{}/api/messages/{}", base_url, message_id))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_send_message_validation() {
    let (base_url, _data_dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let (alice_token, _alice_id) = register_user(&base_url, "Alice", "alice@example.com").await;
    let (_bob_token, bob_id) = register_user(&base_url, "Bob", "bob@example.com").await;

    // Empty message rejected
    let resp = client
        .post(format!("{}/api/messages/send/{}", base_url, bob_id))
        .bearer_auth(&alice_token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Unknown recipient
    let resp = client
        .post(format!("{}/api/messages/send/{}", base_url, "no-such-user"))
        .bearer_auth(&alice_token)
        .json(&json!({ "text": "hello?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Image-only message is typed as image
    let resp = client
        .post(format!("{}/api/messages/send/{}", base_url, bob_id))
        .bearer_auth(&alice_token)
        .json(&json!({ "image": "/uploads/cat.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["messageType"], "image");
    assert!(body["text"].is_null());
}

#[tokio::test]
async fn test_chat_sidebar_excludes_caller() {
    let (base_url, _data_dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let (alice_token, _) = register_user(&base_url, "Alice", "alice@example.com").await;
    register_user(&base_url, "Bob", "bob@example.com").await;
    register_user(&base_url, "Cara", "cara@example.com").await;

    let resp = client
        .get(format!("{}/api/messages/users", base_url))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    let users: serde_json::Value = resp.json().await.unwrap();
    let names: Vec<&str> = users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Bob", "Cara"]);
}
