// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings from clippy.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    routing::{get, post},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

use beacon_server::{
    handlers,
    hub::Hub,
    state::AppState,
    store::Store,
    websocket::websocket_handler,
};

pub const TEST_JWT_SECRET: &str = "test-secret-min-32-characters-long!!";

/// A fresh in-memory SQLite database with migrations applied, one per test.
/// Each connects to its own `:memory:` database — tests never share state.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");
    pool
}

/// Build the full application router wired to a test database pool.
pub fn create_test_app(pool: SqlitePool) -> Router {
    let store = Store::new(pool.clone());
    let hub = Hub::new(store.clone());

    let state = AppState {
        pool,
        jwt_secret: Arc::from(TEST_JWT_SECRET),
        store,
        hub,
    };

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/register", post(handlers::auth::register))
        .route("/api/login", post(handlers::auth::login))
        .route("/api/invite/validate", post(handlers::invites::validate_invite))
        .route("/api/invites", post(handlers::invites::create_invite))
        .route("/api/users", get(handlers::users::list_users))
        .route("/api/users/me", get(handlers::users::get_me))
        .route("/api/users/update-key", post(handlers::users::update_key))
        .route("/api/messages/clear", post(handlers::messages::clear_messages))
        .route("/api/messages/:other_id", get(handlers::messages::list_messages))
        .route("/api/messages", post(handlers::messages::send_message))
        .route("/api/ws", get(websocket_handler))
        .with_state(state)
}

/// A random-enough username so concurrent tests never collide.
pub fn unique_username(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}{n}")
}

async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub async fn post_json(app: Router, path: &str, body: Value) -> (StatusCode, Value) {
    request_json(app, Method::POST, path, None, Some(body)).await
}

pub async fn post_json_auth(app: Router, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
    request_json(app, Method::POST, path, Some(token), Some(body)).await
}

pub async fn get_json_auth(app: Router, path: &str, token: &str) -> (StatusCode, Value) {
    request_json(app, Method::GET, path, Some(token), None).await
}

pub async fn request_without_auth(app: Router, path: &str) -> (StatusCode, Value) {
    request_json(app, Method::GET, path, None, None).await
}

async fn request_json(
    app: Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    builder = builder.header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(v) => Body::from(serde_json::to_vec(&v).unwrap()),
        None => Body::empty(),
    };
    let request = builder.body(body).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let json = body_json(response.into_body()).await;
    (status, json)
}

/// Registers a user (bootstrap-eligible on an empty store) and returns their
/// bearer token alongside the decoded user JSON.
pub async fn register_user(app: Router, username: &str, password: &str) -> (String, Value) {
    let (status, body) = post_json(
        app,
        "/api/register",
        serde_json::json!({
            "username": username,
            "password": password,
            "invite_code": "",
            "public_key": "QUJDRA==",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "registration failed: {body}");
    (
        body["token"].as_str().expect("token in response").to_string(),
        body["user"].clone(),
    )
}
