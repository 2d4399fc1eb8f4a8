//! Base64 wire encoding for opaque byte blobs.
//!
//! Public keys, ciphertext, nonces, and signaling payloads are never
//! interpreted by the server — they are carried as raw bytes internally and
//! only base64-encoded at the JSON boundary so the REST/WebSocket shapes stay
//! text-safe.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::AppError;

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(s: &str) -> Result<Vec<u8>, AppError> {
    STANDARD
        .decode(s)
        .map_err(|_| AppError::BadRequest("invalid base64".into()))
}
