//! Thin module over the embedded relational engine: users, invites, messages.
//!
//! Every mutating operation here is a single SQL statement — no multi-statement
//! transactions are exposed, so atomicity is whatever SQLite's single-writer
//! WAL connection already gives a single `UPDATE`/`INSERT`.

use chrono::Utc;
use rand::RngCore;
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::{Invite, Message, User};

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Create a user. Fails with `AppError::Conflict` if the username is
    /// already taken — the UNIQUE constraint on `users.username` is the
    /// source of truth, not a pre-check (avoids a TOCTOU race between the
    /// check and the insert).
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        public_key: &[u8],
    ) -> AppResult<User> {
        let now = Utc::now();
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, public_key, created_at, last_seen)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, username, password_hash, public_key, created_at, last_seen
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(public_key)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(ref db_err)) if is_unique_violation(db_err.as_ref()) => {
                Err(AppError::Conflict("username already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, public_key, created_at, last_seen
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, public_key, created_at, last_seen
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_all_users(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, public_key, created_at, last_seen
             FROM users ORDER BY username ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// `true` iff no users exist yet — the bootstrap rule lets the first
    /// registration skip the invite requirement.
    pub async fn is_empty(&self) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count == 0)
    }

    pub async fn update_public_key(&self, user_id: i64, public_key: &[u8]) -> AppResult<()> {
        sqlx::query("UPDATE users SET public_key = ? WHERE id = ?")
            .bind(public_key)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_last_seen(&self, user_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Persist a message. The returned record carries the server-assigned
    /// `id` and `timestamp` — callers never invent either.
    pub async fn save_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        message_type: &str,
        content: &[u8],
        nonce: &[u8],
    ) -> AppResult<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, type, content, nonce, timestamp, read)
            VALUES (?, ?, ?, ?, ?, ?, 0)
            RETURNING id, sender_id, receiver_id, type, content, nonce, timestamp, read
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(message_type)
        .bind(content)
        .bind(nonce)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    /// Messages between `a` and `b` in either direction, newest first.
    pub async fn get_messages_between(
        &self,
        a: i64,
        b: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, type, content, nonce, timestamp, read
            FROM messages
            WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
            ORDER BY timestamp DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Mark unread messages sent by `sender` to `receiver` as read. Always
    /// succeeds, even if zero rows match.
    pub async fn mark_messages_as_read(&self, sender: i64, receiver: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET read = 1 WHERE sender_id = ? AND receiver_id = ? AND read = 0",
        )
        .bind(sender)
        .bind(receiver)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_messages_between(&self, a: i64, b: i64) -> AppResult<()> {
        sqlx::query(
            "DELETE FROM messages
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Invites
    // ------------------------------------------------------------------

    pub async fn generate_invite(&self) -> AppResult<String> {
        let code = random_hex_code();
        sqlx::query("INSERT INTO invites (code, used_by, created_at, used_at) VALUES (?, NULL, ?, NULL)")
            .bind(&code)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(code)
    }

    /// `Ok(())` iff the code exists and is unconsumed; `Err(InviteUnavailable)` otherwise.
    pub async fn validate_invite(&self, code: &str) -> AppResult<()> {
        let invite = sqlx::query_as::<_, Invite>(
            "SELECT id, code, used_by, created_at, used_at FROM invites WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match invite {
            Some(i) if i.used_by.is_none() => Ok(()),
            _ => Err(AppError::InviteUnavailable),
        }
    }

    /// Atomically consume an invite: the conditional `used_by IS NULL` clause
    /// means exactly one concurrent caller's `rows_affected()` is 1, and every
    /// other racing caller sees 0 and fails with `InviteUnavailable`.
    pub async fn consume_invite(&self, code: &str, user_id: i64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE invites SET used_by = ?, used_at = ? WHERE code = ? AND used_by IS NULL",
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(code)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(AppError::InviteUnavailable)
        }
    }
}

fn is_unique_violation(db_err: &dyn sqlx::error::DatabaseError) -> bool {
    db_err.code().as_deref() == Some("2067") || db_err.code().as_deref() == Some("1555")
}

/// 32 lowercase hex characters, matching the invite code shape in spec.
fn random_hex_code() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
