use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{Display, EnumString};

// ============================================================================
// User
// ============================================================================

/// A registered user. `password_hash` is never serialized — it is excluded
/// from every outward-facing shape except the internal row used by login.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub public_key: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Public shape of a user, returned from `/api/users` and `/api/users/me`.
/// `public_key` is base64 on the wire; `online` is never derivable from the
/// row alone — callers fill it in from `Hub::is_online`.
#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub online: bool,
}

impl User {
    pub fn into_dto(self, online: bool) -> UserDto {
        UserDto {
            id: self.id,
            username: self.username,
            public_key: crate::codec::encode(&self.public_key),
            created_at: self.created_at,
            last_seen: self.last_seen,
            online,
        }
    }
}

// ============================================================================
// Message
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    File,
    Call,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

/// Row shape as stored: `r#type` is the raw `TEXT` column, parsed into
/// `MessageType` at the DTO boundary (`MessageDto::from`) rather than via a
/// custom `sqlx` column decoder — mirrors how the inherited codebase stores
/// channel kind (`text`/`voice`) as a bare string column.
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub r#type: String,
    pub content: Vec<u8>,
    pub nonce: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Wire shape of a `Message` — binary fields are base64, `type` is the bare
/// lowercase string.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDto {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub r#type: MessageType,
    pub content: String,
    pub nonce: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

impl From<Message> for MessageDto {
    fn from(m: Message) -> Self {
        let kind = m.r#type.parse().unwrap_or(MessageType::Text);
        MessageDto {
            id: m.id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            r#type: kind,
            content: crate::codec::encode(&m.content),
            nonce: crate::codec::encode(&m.nonce),
            timestamp: m.timestamp,
            read: m.read,
        }
    }
}

// ============================================================================
// Invite
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct Invite {
    pub id: i64,
    pub code: String,
    pub used_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}
