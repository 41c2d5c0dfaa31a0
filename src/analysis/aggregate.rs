//! Concurrent fan-out over the four scoring scripts
//!
//! The four component analyses are independent: no shared state, no ordering
//! dependency. They run concurrently and the aggregator waits for all four
//! to settle before combining their scores. Because every invocation goes
//! through the fallback wrapper, no branch can fail the join.

use super::{fallback::score_with_fallback, ComponentScore, ScriptRunner, FALLBACK_SCORE};

/// Equal weight applied to each of the four component scores.
const COMPONENT_WEIGHT: f64 = 0.25;

/// Combined result of the four component analyses.
#[derive(Debug, Clone)]
pub struct SpeechAnalysis {
    pub fluency: ComponentScore,
    pub pace: ComponentScore,
    pub tone: ComponentScore,
    pub confidence: ComponentScore,
    pub overall_score: i64,
}

/// Run all four scoring scripts concurrently and aggregate their scores.
///
/// Fluency reads the transcription, tone reads the audio, pace and
/// confidence read both. Each script is shielded by the fallback wrapper
/// with a default score of 50.
pub async fn run_full_analysis(
    runner: &ScriptRunner,
    audio_path: &str,
    transcription: &str,
) -> SpeechAnalysis {
    let fluency_args = [transcription];
    let pace_args = [audio_path, transcription];
    let tone_args = [audio_path];
    let confidence_args = [audio_path, transcription];
    let (fluency, pace, tone, confidence) = tokio::join!(
        score_with_fallback(runner, "fluency_analysis", &fluency_args, FALLBACK_SCORE),
        score_with_fallback(runner, "pace_analysis", &pace_args, FALLBACK_SCORE),
        score_with_fallback(runner, "tone_analysis", &tone_args, FALLBACK_SCORE),
        score_with_fallback(
            runner,
            "confidence_analysis",
            &confidence_args,
            FALLBACK_SCORE
        ),
    );

    let overall_score = weighted_overall([fluency.score, pace.score, tone.score, confidence.score]);

    SpeechAnalysis {
        fluency,
        pace,
        tone,
        confidence,
        overall_score,
    }
}

/// Equal-weighted average of the component scores, rounded to the nearest
/// integer.
fn weighted_overall(scores: [f64; 4]) -> i64 {
    scores
        .iter()
        .map(|s| s * COMPONENT_WEIGHT)
        .sum::<f64>()
        .round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_overall() {
        assert_eq!(weighted_overall([80.0, 60.0, 90.0, 70.0]), 75);
    }

    #[test]
    fn test_weighted_overall_rounds_to_nearest() {
        // 0.25 * (81 + 60 + 90 + 70) = 75.25
        assert_eq!(weighted_overall([81.0, 60.0, 90.0, 70.0]), 75);
        // 0.25 * (83 + 60 + 90 + 70) = 75.75
        assert_eq!(weighted_overall([83.0, 60.0, 90.0, 70.0]), 76);
    }

    #[test]
    fn test_weighted_overall_bounds() {
        assert_eq!(weighted_overall([0.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(weighted_overall([100.0, 100.0, 100.0, 100.0]), 100);
    }
}
