//! speech_sessions queries
//!
//! Every read and delete is scoped to the owning user; a session that exists
//! but belongs to someone else is indistinguishable from one that does not
//! exist.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::{parse_timestamp, parse_uuid};
use crate::error::ApiResult;
use crate::models::{HistoryEntry, ScoreSummary, SpeechSession};

/// Insert a new speech session.
pub async fn insert_session(pool: &SqlitePool, session: &SpeechSession) -> ApiResult<()> {
    sqlx::query(
        r#"
        INSERT INTO speech_sessions (id, user_id, context, audio_file_path, transcription, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(session.user_id.to_string())
    .bind(&session.context)
    .bind(&session.audio_file_path)
    .bind(&session.transcription)
    .bind(session.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a session by id, scoped to its owner.
pub async fn fetch_session(
    pool: &SqlitePool,
    session_id: Uuid,
    user_id: Uuid,
) -> ApiResult<Option<SpeechSession>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, context, audio_file_path, transcription, created_at
        FROM speech_sessions
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            let user: String = row.get("user_id");
            let created_at: String = row.get("created_at");

            Ok(Some(SpeechSession {
                id: parse_uuid(&id, "id")?,
                user_id: parse_uuid(&user, "user_id")?,
                context: row.get("context"),
                audio_file_path: row.get("audio_file_path"),
                transcription: row.get("transcription"),
                created_at: parse_timestamp(&created_at, "created_at")?,
            }))
        }
        None => Ok(None),
    }
}

/// Write the transcription onto a session record.
pub async fn set_transcription(
    pool: &SqlitePool,
    session_id: Uuid,
    transcription: &str,
) -> ApiResult<()> {
    sqlx::query("UPDATE speech_sessions SET transcription = ? WHERE id = ?")
        .bind(transcription)
        .bind(session_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// List a user's sessions newest first, with their score summaries.
pub async fn list_history(
    pool: &SqlitePool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> ApiResult<Vec<HistoryEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.context, s.created_at,
               a.overall_score, a.fluency_score, a.pace_score,
               a.tone_score, a.confidence_score
        FROM speech_sessions s
        LEFT JOIN analysis_results a ON a.session_id = s.id
        WHERE s.user_id = ?
        ORDER BY s.created_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id.to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get("id");
        let created_at: String = row.get("created_at");

        let analysis = row
            .get::<Option<i64>, _>("overall_score")
            .map(|overall_score| ScoreSummary {
                overall_score,
                fluency_score: row.get("fluency_score"),
                pace_score: row.get("pace_score"),
                tone_score: row.get("tone_score"),
                confidence_score: row.get("confidence_score"),
            });

        entries.push(HistoryEntry {
            id: parse_uuid(&id, "id")?,
            context: row.get("context"),
            created_at: parse_timestamp(&created_at, "created_at")?,
            analysis,
        });
    }

    Ok(entries)
}

/// Delete a session scoped to its owner.
///
/// Returns true if a row was removed. The analysis row goes with it via the
/// foreign-key cascade; the audio artifact is the caller's to clean up.
pub async fn delete_session(pool: &SqlitePool, session_id: Uuid, user_id: Uuid) -> ApiResult<bool> {
    let result = sqlx::query("DELETE FROM speech_sessions WHERE id = ? AND user_id = ?")
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
