//! `/api/invite/validate` and `/api/invites`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{auth::AuthUser, error::AppResult, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ValidateInviteRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ValidResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct InviteCodeResponse {
    pub code: String,
}

/// `POST /api/invite/validate` — unauthenticated, a registering client
/// doesn't have a token yet. Returns `400` (via `InviteUnavailable`) rather
/// than `{valid: false}` for an unknown or consumed code.
pub async fn validate_invite(
    State(state): State<AppState>,
    Json(req): Json<ValidateInviteRequest>,
) -> AppResult<Json<ValidResponse>> {
    state.store.validate_invite(&req.code).await?;
    Ok(Json(ValidResponse { valid: true }))
}

/// `POST /api/invites` — any authenticated user may mint one.
pub async fn create_invite(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<InviteCodeResponse>> {
    let code = state.store.generate_invite().await?;
    Ok(Json(InviteCodeResponse { code }))
}
