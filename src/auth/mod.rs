use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json, RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

/// There is no refresh token: a single bearer token is issued at login and
/// stays valid for its full seven-day life. Re-authenticating means logging
/// in again.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub username: String,
}

impl Claims {
    fn new(user_id: i64, username: String) -> Self {
        let now = Utc::now();
        let exp = now + Duration::days(7);

        Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            username,
        }
    }

    pub fn user_id(&self) -> AppResult<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("invalid token subject".into()))
    }
}

// ============================================================================
// JWT operations
// ============================================================================

pub fn create_token(user_id: i64, username: String, secret: &str) -> AppResult<String> {
    let claims = Claims::new(user_id, username);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to create token: {:?}", e);
        AppError::Internal
    })
}

pub fn validate_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("Token validation failed: {:?}", e);
        AppError::Unauthorized("invalid or expired token".into())
    })
}

// ============================================================================
// Password hashing
// ============================================================================

pub fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, 12).map_err(|e| {
        tracing::error!("Failed to hash password: {:?}", e);
        AppError::Internal
    })
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    bcrypt::verify(password, hash).map_err(|e| {
        tracing::error!("Failed to verify password: {:?}", e);
        AppError::Internal
    })
}

// ============================================================================
// Auth middleware
// ============================================================================

/// Authenticated user extracted from a valid bearer token.
///
/// Fields are private: the only valid constructor is the `FromRequestParts`
/// impl, preventing callers from forging an `AuthUser` via struct literal.
pub struct AuthUser {
    user_id: i64,
}

impl AuthUser {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

type AuthRejection = (StatusCode, Json<serde_json::Value>);

fn auth_error(message: &str) -> AuthRejection {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message })))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| auth_error("missing or invalid Authorization header"))?;

        let claims = validate_token(bearer.token(), &state.jwt_secret)
            .map_err(|_| auth_error("invalid or expired token"))?;

        let user_id = claims
            .user_id()
            .map_err(|_| auth_error("invalid token subject"))?;

        Ok(AuthUser { user_id })
    }
}

/// The websocket upgrade handshake cannot carry an `Authorization` header
/// from a browser `WebSocket` client, so the hub endpoint accepts the bearer
/// token as a `?token=` query parameter instead.
pub fn user_from_query_token(token: &str, secret: &str) -> AppResult<(i64, String)> {
    let claims = validate_token(token, secret)?;
    let user_id = claims.user_id()?;
    Ok((user_id, claims.username))
}

// ============================================================================
// Tests
// ============================================================================
