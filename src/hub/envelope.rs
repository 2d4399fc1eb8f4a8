//! Server→client frame shape and the constructors the hub and HTTP handlers
//! use to build one. Binary fields (`content`, `nonce`, `data`) are base64 on
//! the wire; `data` is additionally the base64 of *JSON bytes* — decoding it
//! yields a JSON object, never raw bytes. This double encoding is a quirk of
//! the frame's origin and is preserved deliberately rather than flattened.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::codec;

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub from: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub timestamp: i64,
}

/// Base64-encode a JSON value for the `data` field's double encoding.
fn encode_json(value: serde_json::Value) -> String {
    codec::encode(value.to_string().as_bytes())
}

impl Envelope {
    pub fn presence(user_id: i64, username: String, online: bool) -> Self {
        Envelope {
            kind: "presence".into(),
            id: None,
            from: user_id,
            to: None,
            content: None,
            nonce: None,
            data: Some(encode_json(json!({
                "user_id": user_id,
                "username": username,
                "online": online,
            }))),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn message(id: i64, from: i64, to: i64, content_b64: String, nonce_b64: String) -> Self {
        Envelope {
            kind: "message".into(),
            id: Some(id),
            from,
            to: Some(to),
            content: Some(content_b64),
            nonce: Some(nonce_b64),
            data: None,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn read_receipt(from: i64, to: i64) -> Self {
        Envelope {
            kind: "read_receipt".into(),
            id: None,
            from,
            to: Some(to),
            content: None,
            nonce: None,
            data: None,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn clear_messages(from: i64, to: i64) -> Self {
        Envelope {
            kind: "clear_messages".into(),
            id: None,
            from,
            to: Some(to),
            content: None,
            nonce: None,
            data: None,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// `typing` and the `call_*` signaling types share this shape: the
    /// server only ever relays `payload` as opaque, re-encoded `data`.
    pub fn relay(kind: &str, from: i64, to: i64, payload: serde_json::Value) -> Self {
        Envelope {
            kind: kind.to_string(),
            id: None,
            from,
            to: Some(to),
            content: None,
            nonce: None,
            data: Some(encode_json(payload)),
            timestamp: Utc::now().timestamp(),
        }
    }
}
