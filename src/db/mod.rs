//! Database initialization and access layer
//!
//! SQLite via sqlx with WAL journaling and foreign keys enforced on every
//! pooled connection. Schema creation is idempotent; tables are created on
//! first startup.

pub mod analyses;
pub mod sessions;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Open (creating if missing) the database and ensure the schema exists.
pub async fn init_database(db_path: &Path) -> ApiResult<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&db_path.display().to_string())
        .map_err(ApiError::Database)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000))
        // Cascade delete from speech_sessions to analysis_results relies on
        // foreign keys being enforced on every connection.
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    create_speech_sessions_table(&pool).await?;
    create_analysis_results_table(&pool).await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    Ok(pool)
}

/// Create speech_sessions table
async fn create_speech_sessions_table(pool: &SqlitePool) -> ApiResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speech_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            context TEXT NOT NULL,
            audio_file_path TEXT NOT NULL,
            transcription TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_speech_sessions_user_created
         ON speech_sessions(user_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create analysis_results table
///
/// `session_id` is UNIQUE: analysis is write-once per session. The foreign
/// key cascades so deleting a session removes its analysis row.
async fn create_analysis_results_table(pool: &SqlitePool) -> ApiResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE
                REFERENCES speech_sessions(id) ON DELETE CASCADE,
            fluency_score REAL NOT NULL,
            pace_score REAL NOT NULL,
            tone_score REAL NOT NULL,
            confidence_score REAL NOT NULL,
            overall_score INTEGER NOT NULL,
            filler_words TEXT NOT NULL,
            wpm REAL NOT NULL,
            feedback TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Parse a TEXT-encoded UUID column value.
pub(crate) fn parse_uuid(value: &str, column: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| ApiError::Internal(format!("Failed to parse {column}: {e}")))
}

/// Parse a TEXT-encoded RFC 3339 timestamp column value.
pub(crate) fn parse_timestamp(
    value: &str,
    column: &str,
) -> ApiResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| ApiError::Internal(format!("Failed to parse {column}: {e}")))
}
