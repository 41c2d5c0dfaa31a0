//! Speech analysis orchestration
//!
//! Sequences the external analysis scripts for one speech session:
//! speech-to-text first, then four scoring scripts fanned out concurrently.
//! Each scoring invocation is shielded by a fallback so a single failing
//! script degrades its own component instead of aborting the run; only a
//! transcription failure is fatal.

pub mod aggregate;
pub mod coordinator;
pub mod fallback;
pub mod runner;

pub use aggregate::{run_full_analysis, SpeechAnalysis};
pub use coordinator::{AnalysisCoordinator, AnalysisOutcome};
pub use fallback::score_with_fallback;
pub use runner::{ScriptError, ScriptRunner};

use serde::Deserialize;

/// Substitute score used when a scoring script fails.
pub const FALLBACK_SCORE: f64 = 50.0;

/// Output of the speech-to-text script.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionOutput {
    pub transcription: String,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Output of one scoring script.
///
/// All four scoring scripts share this shape. `filler_words` is only
/// populated by fluency analysis, `wpm` only by pace analysis.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScore {
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub filler_words: Vec<String>,
    #[serde(default)]
    pub wpm: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_score_full_document() {
        let score: ComponentScore = serde_json::from_str(
            r#"{"success": true, "score": 82, "feedback": "Good fluency overall.",
                "fillerWords": ["um", "like"], "fillerCount": 2, "wpm": 135}"#,
        )
        .unwrap();

        assert_eq!(score.score, 82.0);
        assert_eq!(score.filler_words, vec!["um", "like"]);
        assert_eq!(score.wpm, Some(135.0));
    }

    #[test]
    fn test_component_score_minimal_document() {
        // Tone and confidence scripts emit only score + feedback.
        let score: ComponentScore =
            serde_json::from_str(r#"{"success": true, "score": 70, "feedback": "ok"}"#).unwrap();

        assert!(score.filler_words.is_empty());
        assert_eq!(score.wpm, None);
    }

    #[test]
    fn test_transcription_output() {
        let out: TranscriptionOutput = serde_json::from_str(
            r#"{"success": true, "transcription": "hello world", "duration": 12.5}"#,
        )
        .unwrap();

        assert_eq!(out.transcription, "hello world");
        assert_eq!(out.duration, Some(12.5));
    }
}
