//! `/api/register` and `/api/login`.
//!
//! Both endpoints are exempt from the bearer-token auth extractor — they are
//! how a bearer token comes to exist in the first place.

use axum::{extract::State, Json};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::{
    auth::{create_token, hash_password, verify_password},
    codec,
    error::{AppError, AppResult},
    models::UserDto,
    state::AppState,
};

/// Letters, digits, and underscores only — matches the allowed-character set
/// the inherited codebase enforces client-side for display names.
static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 32, message = "username must be 3-32 characters"),
        regex(path = *USERNAME_RE, message = "username may only contain letters, digits, and underscores")
    )]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    /// Empty string (or absent) selects the bootstrap path when the user
    /// table has no rows yet; otherwise an unused invite is required.
    #[serde(default)]
    pub invite_code: String,
    pub public_key: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserDto,
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::BadRequest(
        e.field_errors()
            .values()
            .flat_map(|v| v.iter())
            .filter_map(|e| e.message.as_ref())
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// `POST /api/register`.
///
/// Bootstrap rule: if the user table is empty, an invite code is optional.
/// Otherwise one is required and must be unused. Matching the inherited
/// source literally: `consume_invite` runs whenever a non-empty code was
/// supplied, even on the bootstrap path — only a blank code skips it.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    req.validate().map_err(validation_error)?;

    let public_key = codec::decode(&req.public_key)?;
    let code = req.invite_code.trim();

    // Username conflicts are reported ahead of invite gating: a repeat
    // registration of an already-taken name should read as a name clash,
    // not as a spurious invite-unavailable error.
    if state
        .store
        .get_user_by_username(&req.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("username already exists".into()));
    }

    if code.is_empty() {
        if !state.store.is_empty().await? {
            return Err(AppError::InviteUnavailable);
        }
    } else {
        state.store.validate_invite(code).await?;
    }

    let password_hash = hash_password(&req.password)?;
    let user = state
        .store
        .create_user(&req.username, &password_hash, &public_key)
        .await?;

    if !code.is_empty() {
        state.store.consume_invite(code, user.id).await?;
    }

    info!(user_id = user.id, username = %user.username, "user registered");

    let token = create_token(user.id, user.username.clone(), &state.jwt_secret)?;
    let online = state.hub.is_online(user.id).await;

    Ok(Json(AuthResponse {
        token,
        user: user.into_dto(online),
    }))
}

/// `POST /api/login`. Does not mutate the stored public key — the client
/// follows up with `/api/users/update-key` if its local key has changed.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = state
        .store
        .get_user_by_username(&req.username)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::Unauthorized("invalid username or password".into()));
    }

    info!(user_id = user.id, username = %user.username, "user logged in");

    let token = create_token(user.id, user.username.clone(), &state.jwt_secret)?;
    let online = state.hub.is_online(user.id).await;

    Ok(Json(AuthResponse {
        token,
        user: user.into_dto(online),
    }))
}
