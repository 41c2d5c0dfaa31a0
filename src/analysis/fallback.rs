//! Fallback shielding for scoring invocations
//!
//! A malfunctioning scoring script must never abort the overall analysis:
//! the user still receives a complete result, with the failing component
//! carrying a neutral score and the failure cause in its feedback text.
//! The invocation is attempted exactly once; there is no retry.

use tracing::warn;

use super::{ComponentScore, ScriptRunner};

/// Run one scoring script, substituting a default result on any failure.
pub async fn score_with_fallback(
    runner: &ScriptRunner,
    script: &str,
    args: &[&str],
    default_score: f64,
) -> ComponentScore {
    match runner.run::<ComponentScore>(script, args).await {
        Ok(score) => score,
        Err(err) => {
            warn!(script, error = %err, "scoring script failed, substituting default score");
            ComponentScore {
                score: default_score,
                feedback: format!("Analysis could not be completed. {err}"),
                filler_words: Vec::new(),
                wpm: None,
            }
        }
    }
}
