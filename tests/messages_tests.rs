mod common;

use axum::http::StatusCode;
use serde_json::json;

/// Registers two fresh users on the given pool and returns their
/// `(token, user_id)` pairs. The first registration is bootstrap-eligible;
/// the second needs an invite, which alice mints.
async fn register_pair(pool: sqlx::SqlitePool) -> ((String, i64), (String, i64)) {
    let app = common::create_test_app(pool.clone());
    let (alice_token, alice) = common::register_user(app, "alice", "hunter22").await;

    let app = common::create_test_app(pool.clone());
    let (_, body) = common::post_json_auth(app, "/api/invites", &alice_token, json!({})).await;
    let code = body["code"].as_str().unwrap().to_string();

    let app = common::create_test_app(pool);
    let (status, bob) = common::post_json(
        app,
        "/api/register",
        json!({
            "username": "bob",
            "password": "secret12",
            "invite_code": code,
            "public_key": "QkJCQg==",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    (
        (alice_token, alice["id"].as_i64().unwrap()),
        (bob["token"].as_str().unwrap().to_string(), bob["user"]["id"].as_i64().unwrap()),
    )
}

// ============================================================================
// POST /api/messages — send
// ============================================================================

#[tokio::test]
async fn send_message_persists_and_returns_server_assigned_fields() {
    let pool = common::test_pool().await;
    let ((alice_token, _alice_id), (_bob_token, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool);
    let (status, body) = common::post_json_auth(
        app,
        "/api/messages",
        &alice_token,
        json!({
            "receiver_id": bob_id,
            "content": "Y2lwaGVy",
            "nonce": "bm9uY2U=",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["id"].is_i64());
    assert_eq!(body["content"], "Y2lwaGVy");
    assert_eq!(body["nonce"], "bm9uY2U=");
    assert_eq!(body["type"], "text");
    assert_eq!(body["read"], false);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn send_message_defaults_type_to_text() {
    let pool = common::test_pool().await;
    let ((alice_token, _), (_, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool);
    let (_, body) = common::post_json_auth(
        app,
        "/api/messages",
        &alice_token,
        json!({ "receiver_id": bob_id, "content": "QQ==", "nonce": "Tg==" }),
    )
    .await;

    assert_eq!(body["type"], "text");
}

#[tokio::test]
async fn send_message_accepts_explicit_call_type() {
    let pool = common::test_pool().await;
    let ((alice_token, _), (_, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool);
    let (status, body) = common::post_json_auth(
        app,
        "/api/messages",
        &alice_token,
        json!({ "receiver_id": bob_id, "type": "call", "content": "QQ==", "nonce": "Tg==" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "call");
}

#[tokio::test]
async fn send_message_rejects_unknown_type() {
    let pool = common::test_pool().await;
    let ((alice_token, _), (_, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool);
    let (status, _) = common::post_json_auth(
        app,
        "/api/messages",
        &alice_token,
        json!({ "receiver_id": bob_id, "type": "sticker", "content": "QQ==", "nonce": "Tg==" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_message_rejects_invalid_base64_content() {
    let pool = common::test_pool().await;
    let ((alice_token, _), (_, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool);
    let (status, _) = common::post_json_auth(
        app,
        "/api/messages",
        &alice_token,
        json!({ "receiver_id": bob_id, "content": "not base64!!!", "nonce": "Tg==" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_message_to_unknown_receiver_is_not_found() {
    let pool = common::test_pool().await;
    let app = common::create_test_app(pool.clone());
    let (token, _) = common::register_user(app, "alice", "hunter22").await;

    let app = common::create_test_app(pool);
    let (status, _) = common::post_json_auth(
        app,
        "/api/messages",
        &token,
        json!({ "receiver_id": 999_999, "content": "QQ==", "nonce": "Tg==" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn send_message_requires_auth() {
    let pool = common::test_pool().await;
    let app = common::create_test_app(pool.clone());
    let (_, bob) = common::register_user(app, "alice", "hunter22").await;
    let bob_id = bob["id"].as_i64().unwrap();

    let app = common::create_test_app(pool);
    let (status, _) = common::post_json(
        app,
        "/api/messages",
        json!({ "receiver_id": bob_id, "content": "QQ==", "nonce": "Tg==" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// GET /api/messages/{other_id} — list + read receipts
// ============================================================================

#[tokio::test]
async fn list_messages_between_is_empty_before_any_are_sent() {
    let pool = common::test_pool().await;
    let ((alice_token, _), (_, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool);
    let (status, body) =
        common::get_json_auth(app, &format!("/api/messages/{bob_id}"), &alice_token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn list_messages_returns_newest_first() {
    let pool = common::test_pool().await;
    let ((alice_token, _), (_, bob_id)) = register_pair(pool.clone()).await;

    for content in ["QQ==", "Qg==", "Qw=="] {
        let app = common::create_test_app(pool.clone());
        common::post_json_auth(
            app,
            "/api/messages",
            &alice_token,
            json!({ "receiver_id": bob_id, "content": content, "nonce": "Tg==" }),
        )
        .await;
    }

    let app = common::create_test_app(pool);
    let (status, body) =
        common::get_json_auth(app, &format!("/api/messages/{bob_id}"), &alice_token).await;

    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 3);
    // Newest first: the last one sent ("Qw==") leads.
    assert_eq!(messages[0]["content"], "Qw==");
    assert_eq!(messages[2]["content"], "QQ==");
}

#[tokio::test]
async fn list_messages_respects_limit_and_offset() {
    let pool = common::test_pool().await;
    let ((alice_token, _), (_, bob_id)) = register_pair(pool.clone()).await;

    for _ in 0..5u32 {
        let app = common::create_test_app(pool.clone());
        common::post_json_auth(
            app,
            "/api/messages",
            &alice_token,
            json!({ "receiver_id": bob_id, "content": "QQ==", "nonce": "Tg==" }),
        )
        .await;
    }

    let app = common::create_test_app(pool);
    let (status, body) = common::get_json_auth(
        app,
        &format!("/api/messages/{bob_id}?limit=2&offset=1"),
        &alice_token,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn opening_conversation_marks_incoming_messages_read() {
    let pool = common::test_pool().await;
    let ((alice_token, _), (bob_token, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool.clone());
    let (_, sent) = common::post_json_auth(
        app,
        "/api/messages",
        &alice_token,
        json!({ "receiver_id": bob_id, "content": "QQ==", "nonce": "Tg==" }),
    )
    .await;
    assert_eq!(sent["read"], false);

    // Bob opens the conversation: his GET should mark alice's message read.
    let alice_id = sent["sender_id"].as_i64().unwrap();
    let app = common::create_test_app(pool.clone());
    let (status, first_view) =
        common::get_json_auth(app, &format!("/api/messages/{alice_id}"), &bob_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first_view.as_array().unwrap()[0]["read"], false);

    // A second GET by alice now sees it flipped to read.
    let app = common::create_test_app(pool);
    let (_, second_view) =
        common::get_json_auth(app, &format!("/api/messages/{bob_id}"), &alice_token).await;
    assert_eq!(second_view.as_array().unwrap()[0]["read"], true);
}

#[tokio::test]
async fn list_messages_requires_auth() {
    let pool = common::test_pool().await;
    let ((_, _), (_, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool);
    let (status, _) =
        common::request_without_auth(app, &format!("/api/messages/{bob_id}")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// POST /api/messages/clear
// ============================================================================

#[tokio::test]
async fn clear_messages_deletes_both_directions() {
    let pool = common::test_pool().await;
    let ((alice_token, _), (bob_token, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool.clone());
    let (_, sent) = common::post_json_auth(
        app,
        "/api/messages",
        &alice_token,
        json!({ "receiver_id": bob_id, "content": "QQ==", "nonce": "Tg==" }),
    )
    .await;
    let alice_id = sent["sender_id"].as_i64().unwrap();

    let app = common::create_test_app(pool.clone());
    common::post_json_auth(
        app,
        "/api/messages",
        &bob_token,
        json!({ "receiver_id": alice_id, "content": "Qg==", "nonce": "Tw==" }),
    )
    .await;

    let app = common::create_test_app(pool.clone());
    let (status, body) = common::post_json_auth(
        app,
        "/api/messages/clear",
        &alice_token,
        json!({ "other_user_id": bob_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let app = common::create_test_app(pool.clone());
    let (_, alice_view) =
        common::get_json_auth(app, &format!("/api/messages/{bob_id}"), &alice_token).await;
    assert_eq!(alice_view, json!([]));

    let app = common::create_test_app(pool);
    let (_, bob_view) =
        common::get_json_auth(app, &format!("/api/messages/{alice_id}"), &bob_token).await;
    assert_eq!(bob_view, json!([]));
}

#[tokio::test]
async fn clear_messages_requires_auth() {
    let pool = common::test_pool().await;
    let ((_, _), (_, bob_id)) = register_pair(pool.clone()).await;

    let app = common::create_test_app(pool);
    let (status, _) = common::post_json(
        app,
        "/api/messages/clear",
        json!({ "other_user_id": bob_id }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
