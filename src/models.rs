//! Domain models and API response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::SpeechAnalysis;

/// One user-submitted recording plus its context.
///
/// `user_id` is immutable after creation; only the owning user may read,
/// analyze, or delete the session. `transcription` is written exactly once,
/// by the analysis coordinator.
#[derive(Debug, Clone)]
pub struct SpeechSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub context: String,
    pub audio_file_path: String,
    pub transcription: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SpeechSession {
    pub fn new(user_id: Uuid, context: String, audio_file_path: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            context,
            audio_file_path,
            transcription: None,
            created_at: Utc::now(),
        }
    }
}

/// One human-readable feedback string per analysis component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackBundle {
    pub fluency: String,
    pub pace: String,
    pub tone: String,
    pub confidence: String,
}

/// Persisted outcome of analyzing one session.
///
/// Exists iff analysis completed for its session; immutable thereafter;
/// removed only by the session's cascading delete.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub fluency_score: f64,
    pub pace_score: f64,
    pub tone_score: f64,
    pub confidence_score: f64,
    pub overall_score: i64,
    pub filler_words: Vec<String>,
    pub wpm: f64,
    pub feedback: FeedbackBundle,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Fold the aggregator's output into a persistable record.
    pub fn from_analysis(session_id: Uuid, analysis: &SpeechAnalysis) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            fluency_score: analysis.fluency.score,
            pace_score: analysis.pace.score,
            tone_score: analysis.tone.score,
            confidence_score: analysis.confidence.score,
            overall_score: analysis.overall_score,
            filler_words: analysis.fluency.filler_words.clone(),
            wpm: analysis.pace.wpm.unwrap_or(0.0),
            feedback: FeedbackBundle {
                fluency: analysis.fluency.feedback.clone(),
                pace: analysis.pace.feedback.clone(),
                tone: analysis.tone.feedback.clone(),
                confidence: analysis.confidence.feedback.clone(),
            },
            created_at: Utc::now(),
        }
    }
}

/// Score summary nested under history entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub overall_score: i64,
    pub fluency_score: f64,
    pub pace_score: f64,
    pub tone_score: f64,
    pub confidence_score: f64,
}

/// One row of the speech history listing, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub context: String,
    pub created_at: DateTime<Utc>,
    pub analysis: Option<ScoreSummary>,
}
