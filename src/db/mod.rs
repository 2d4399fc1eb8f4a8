use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Open the embedded database.
///
/// SQLite allows only one writer at a time; rather than serialize writes
/// behind an application-level mutex, the pool is opened in WAL mode so
/// readers never block on the writer, and a busy timeout absorbs the brief
/// contention window when two writers do race for the single write lock.
pub async fn create_pool(database_url: &str) -> AppResult<SqlitePool> {
    info!("🔌 Connecting to database...");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            tracing::error!("Invalid database URL: {:?}", e);
            AppError::Internal
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {:?}", e);
            AppError::Database(e)
        })?;

    info!("✅ Database connection pool created");
    Ok(pool)
}

pub async fn health_check(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

    Ok(())
}
