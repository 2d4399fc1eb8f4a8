//! `/api/messages`, `/api/messages/{other_id}`, `/api/messages/clear`.
//!
//! Persistence here is the source of truth: every mutating handler writes
//! through the store first and only *then* makes a best-effort attempt at
//! real-time delivery via the hub. A dropped real-time frame never fails
//! the request — the client's reconciliation path (refetch on conversation
//! open) is what the hub's bounded, best-effort queues rely on.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthUser,
    codec,
    error::{AppError, AppResult},
    hub::Envelope,
    models::{MessageDto, MessageType},
    state::AppState,
};

const DEFAULT_LIMIT: i64 = 50;
const DEFAULT_OFFSET: i64 = 0;

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    #[serde(default)]
    pub r#type: Option<String>,
    pub content: String,
    pub nonce: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearMessagesRequest {
    pub other_user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// `GET /api/messages/{other_id}` — up to 50 messages between the caller and
/// `other_id`, newest first. Marks the caller's incoming half of the
/// conversation as read and, if the sender is online, notifies them with a
/// `read_receipt` frame.
pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(other_id): Path<i64>,
    Query(query): Query<ListMessagesQuery>,
) -> AppResult<Json<Vec<MessageDto>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = query.offset.unwrap_or(DEFAULT_OFFSET);

    let messages = state
        .store
        .get_messages_between(auth.user_id(), other_id, limit, offset)
        .await?;

    let affected = state
        .store
        .mark_messages_as_read(other_id, auth.user_id())
        .await?;

    if affected > 0 {
        state
            .hub
            .send_message(other_id, Envelope::read_receipt(auth.user_id(), other_id))
            .await;
    }

    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}

/// `POST /api/messages`.
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<MessageDto>> {
    state
        .store
        .get_user_by_id(req.receiver_id)
        .await?
        .ok_or_else(|| AppError::NotFound("receiver not found".into()))?;

    let message_type = match req.r#type.as_deref() {
        None => MessageType::Text,
        Some(raw) => raw
            .parse::<MessageType>()
            .map_err(|_| AppError::BadRequest(format!("invalid message type '{raw}'")))?,
    };

    let content = codec::decode(&req.content)?;
    let nonce = codec::decode(&req.nonce)?;

    let message = state
        .store
        .save_message(
            auth.user_id(),
            req.receiver_id,
            &message_type.to_string(),
            &content,
            &nonce,
        )
        .await?;

    let envelope = Envelope::message(
        message.id,
        auth.user_id(),
        req.receiver_id,
        req.content.clone(),
        req.nonce.clone(),
    );
    state.hub.send_message(req.receiver_id, envelope).await;

    Ok(Json(MessageDto::from(message)))
}

/// `POST /api/messages/clear` — deletes the conversation in both directions
/// and notifies the peer if they are online. This is the REST counterpart
/// to the `clear_messages` WebSocket notification; both close the gap left
/// by `handleClearMessages` never having been wired into a router.
pub async fn clear_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ClearMessagesRequest>,
) -> AppResult<Json<SuccessResponse>> {
    state
        .store
        .delete_messages_between(auth.user_id(), req.other_user_id)
        .await?;

    state
        .hub
        .send_message(
            req.other_user_id,
            Envelope::clear_messages(auth.user_id(), req.other_user_id),
        )
        .await;

    Ok(Json(SuccessResponse { success: true }))
}
