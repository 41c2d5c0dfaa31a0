//! analysis_results queries

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::{parse_timestamp, parse_uuid};
use crate::error::{ApiError, ApiResult};
use crate::models::{AnalysisRecord, FeedbackBundle};

/// Insert an analysis record.
///
/// The UNIQUE constraint on `session_id` rejects a second record for the
/// same session.
pub async fn insert_analysis(pool: &SqlitePool, record: &AnalysisRecord) -> ApiResult<()> {
    let filler_words = serde_json::to_string(&record.filler_words)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize filler_words: {e}")))?;
    let feedback = serde_json::to_string(&record.feedback)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize feedback: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO analysis_results (
            id, session_id, fluency_score, pace_score, tone_score,
            confidence_score, overall_score, filler_words, wpm, feedback, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.session_id.to_string())
    .bind(record.fluency_score)
    .bind(record.pace_score)
    .bind(record.tone_score)
    .bind(record.confidence_score)
    .bind(record.overall_score)
    .bind(filler_words)
    .bind(record.wpm)
    .bind(feedback)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch the analysis record for a session, if analysis has completed.
pub async fn fetch_by_session(
    pool: &SqlitePool,
    session_id: Uuid,
) -> ApiResult<Option<AnalysisRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, session_id, fluency_score, pace_score, tone_score,
               confidence_score, overall_score, filler_words, wpm, feedback, created_at
        FROM analysis_results
        WHERE session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            let session: String = row.get("session_id");
            let created_at: String = row.get("created_at");

            let filler_words: String = row.get("filler_words");
            let filler_words: Vec<String> = serde_json::from_str(&filler_words)
                .map_err(|e| ApiError::Internal(format!("Failed to parse filler_words: {e}")))?;

            let feedback: String = row.get("feedback");
            let feedback: FeedbackBundle = serde_json::from_str(&feedback)
                .map_err(|e| ApiError::Internal(format!("Failed to parse feedback: {e}")))?;

            Ok(Some(AnalysisRecord {
                id: parse_uuid(&id, "id")?,
                session_id: parse_uuid(&session, "session_id")?,
                fluency_score: row.get("fluency_score"),
                pace_score: row.get("pace_score"),
                tone_score: row.get("tone_score"),
                confidence_score: row.get("confidence_score"),
                overall_score: row.get("overall_score"),
                filler_words,
                wpm: row.get("wpm"),
                feedback,
                created_at: parse_timestamp(&created_at, "created_at")?,
            }))
        }
        None => Ok(None),
    }
}
