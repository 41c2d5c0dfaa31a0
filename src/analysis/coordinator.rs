//! Request-level analysis sequencing
//!
//! Drives one session through lookup, transcription, scoring, and
//! persistence. Analysis is write-once per session: a persisted result
//! short-circuits any later request, and a per-session lock serializes
//! concurrent requests so the second caller observes the first one's
//! persisted row instead of redoing the subprocess work.

use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{run_full_analysis, ScriptRunner, TranscriptionOutput};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::AnalysisRecord;

/// Outcome of an analyze request.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: AnalysisRecord,
    pub transcription: Option<String>,
    pub context: String,
    /// True when a previously persisted result was returned without running
    /// any subprocess.
    pub already_existed: bool,
}

/// Sequences analysis for speech sessions.
pub struct AnalysisCoordinator {
    db: SqlitePool,
    runner: ScriptRunner,
    /// Per-session advisory locks. Entries exist only while a request for
    /// that session is in flight.
    in_flight: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl AnalysisCoordinator {
    pub fn new(db: SqlitePool, runner: ScriptRunner) -> Self {
        Self {
            db,
            runner,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Analyze a session on behalf of its owner.
    ///
    /// # Errors
    /// - [`ApiError::NotFound`] if the session is absent or owned by another
    ///   user (the two cases are indistinguishable to the caller).
    /// - [`ApiError::Transcription`] if speech-to-text fails; scoring
    ///   failures do not error (each degrades to its fallback score).
    /// - [`ApiError::Database`] if persistence fails; already-computed
    ///   subprocess work is not retried.
    pub async fn analyze(&self, user_id: Uuid, session_id: Uuid) -> ApiResult<AnalysisOutcome> {
        let lock = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.entry(session_id).or_default().clone()
        };

        let outcome = {
            let _held = lock.lock().await;
            self.analyze_locked(user_id, session_id).await
        };

        // Drop the map entry unless another request still holds a clone
        // (the map's reference plus ours makes two).
        {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(entry) = in_flight.get(&session_id) {
                if Arc::strong_count(entry) <= 2 {
                    in_flight.remove(&session_id);
                }
            }
        }

        outcome
    }

    async fn analyze_locked(&self, user_id: Uuid, session_id: Uuid) -> ApiResult<AnalysisOutcome> {
        let session = db::sessions::fetch_session(&self.db, session_id, user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Speech session not found".to_string()))?;

        if let Some(existing) = db::analyses::fetch_by_session(&self.db, session_id).await? {
            debug!(%session_id, "analysis already exists, skipping subprocess work");
            return Ok(AnalysisOutcome {
                analysis: existing,
                transcription: session.transcription,
                context: session.context,
                already_existed: true,
            });
        }

        info!(%session_id, "starting speech analysis");

        let transcription: TranscriptionOutput = self
            .runner
            .run("speech_to_text", &[session.audio_file_path.as_str()])
            .await
            .map_err(ApiError::Transcription)?;

        // Persisted before scoring starts, so a crash mid-scoring still
        // leaves the transcript recoverable.
        db::sessions::set_transcription(&self.db, session_id, &transcription.transcription)
            .await?;

        let analysis = run_full_analysis(
            &self.runner,
            &session.audio_file_path,
            &transcription.transcription,
        )
        .await;

        let record = AnalysisRecord::from_analysis(session_id, &analysis);
        db::analyses::insert_analysis(&self.db, &record).await?;

        info!(%session_id, overall = record.overall_score, "speech analysis complete");

        Ok(AnalysisOutcome {
            analysis: record,
            transcription: Some(transcription.transcription),
            context: session.context,
            already_existed: false,
        })
    }
}
