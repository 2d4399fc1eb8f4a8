//! `/api/users`, `/api/users/me`, `/api/users/update-key`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthUser,
    codec,
    error::{AppError, AppResult},
    models::UserDto,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct UpdateKeyRequest {
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// `GET /api/users` — every user, `online` filled in from the hub.
pub async fn list_users(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<UserDto>>> {
    let users = state.store.get_all_users().await?;
    let mut dtos = Vec::with_capacity(users.len());
    for user in users {
        let online = state.hub.is_online(user.id).await;
        dtos.push(user.into_dto(online));
    }
    Ok(Json(dtos))
}

/// `GET /api/users/me` — the caller is, by definition, online.
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<UserDto>> {
    let user = state
        .store
        .get_user_by_id(auth.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    Ok(Json(user.into_dto(true)))
}

/// `POST /api/users/update-key`.
pub async fn update_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateKeyRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let public_key = codec::decode(&req.public_key)?;
    state.store.update_public_key(auth.user_id(), &public_key).await?;
    Ok(Json(SuccessResponse { success: true }))
}
