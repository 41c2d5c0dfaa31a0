//! Integration tests for the analysis orchestration
//!
//! The external scripts are stubbed with tiny shell scripts run through
//! `sh`, so every failure mode of a real script (non-zero exit, garbage
//! output, in-band error, hang) can be reproduced deterministically.

use std::path::Path;
use std::time::Duration;

use speaksmart_api::analysis::{
    run_full_analysis, score_with_fallback, AnalysisCoordinator, ComponentScore, ScriptError,
    ScriptRunner, TranscriptionOutput,
};
use speaksmart_api::db;
use speaksmart_api::error::ApiError;
use speaksmart_api::models::SpeechSession;
use uuid::Uuid;

/// Write a stub script that the runner will invoke as `sh <name>.py ...`.
fn write_script(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(format!("{name}.py")), body).unwrap();
}

fn runner(dir: &Path) -> ScriptRunner {
    ScriptRunner::new("sh", dir, Duration::from_secs(5))
}

/// Stub scripts for a fully healthy analysis run.
fn write_healthy_scripts(dir: &Path) {
    write_script(
        dir,
        "speech_to_text",
        r#"echo '{"success": true, "transcription": "hello world", "duration": 30.5}'"#,
    );
    write_script(
        dir,
        "fluency_analysis",
        r#"echo '{"success": true, "score": 80, "feedback": "Good fluency", "fillerWords": ["um"], "fillerCount": 1}'"#,
    );
    write_script(
        dir,
        "pace_analysis",
        r#"echo '{"success": true, "score": 60, "feedback": "A bit slow", "wpm": 120, "duration": 30.5}'"#,
    );
    write_script(
        dir,
        "tone_analysis",
        r#"echo '{"success": true, "score": 90, "feedback": "Warm tone"}'"#,
    );
    write_script(
        dir,
        "confidence_analysis",
        r#"echo '{"success": true, "score": 70, "feedback": "Mostly steady"}'"#,
    );
}

// =============================================================================
// Subprocess invoker
// =============================================================================

#[tokio::test]
async fn test_runner_parses_success_output() {
    let dir = tempfile::tempdir().unwrap();
    write_healthy_scripts(dir.path());

    let out: TranscriptionOutput = runner(dir.path())
        .run("speech_to_text", &["audio.wav"])
        .await
        .unwrap();

    assert_eq!(out.transcription, "hello world");
    assert_eq!(out.duration, Some(30.5));
}

#[tokio::test]
async fn test_runner_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "tone_analysis", "echo boom >&2\nexit 3");

    let err = runner(dir.path())
        .run::<ComponentScore>("tone_analysis", &["audio.wav"])
        .await
        .unwrap_err();

    match err {
        ScriptError::Exit { code, stderr, .. } => {
            assert_eq!(code, 3);
            assert!(stderr.contains("boom"));
        }
        other => panic!("expected Exit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_runner_malformed_output() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "tone_analysis", "echo this is not json");

    let err = runner(dir.path())
        .run::<ComponentScore>("tone_analysis", &["audio.wav"])
        .await
        .unwrap_err();

    assert!(matches!(err, ScriptError::MalformedOutput { .. }));
}

#[tokio::test]
async fn test_runner_inband_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_script(
        dir.path(),
        "speech_to_text",
        r#"echo '{"success": false, "error": "Could not understand audio"}'"#,
    );

    let err = runner(dir.path())
        .run::<TranscriptionOutput>("speech_to_text", &["audio.wav"])
        .await
        .unwrap_err();

    match err {
        ScriptError::Reported { message, .. } => {
            assert_eq!(message, "Could not understand audio");
        }
        other => panic!("expected Reported, got {other:?}"),
    }
}

#[tokio::test]
async fn test_runner_missing_interpreter_is_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_healthy_scripts(dir.path());

    let runner = ScriptRunner::new("/nonexistent/interpreter", dir.path(), Duration::from_secs(5));
    let err = runner
        .run::<TranscriptionOutput>("speech_to_text", &["audio.wav"])
        .await
        .unwrap_err();

    assert!(matches!(err, ScriptError::Launch { .. }));
}

#[tokio::test]
async fn test_runner_missing_script_is_exit_failure() {
    // The interpreter starts fine and then fails to open the script, so this
    // surfaces as a non-zero exit rather than a launch failure.
    let dir = tempfile::tempdir().unwrap();

    let err = runner(dir.path())
        .run::<ComponentScore>("tone_analysis", &["audio.wav"])
        .await
        .unwrap_err();

    assert!(matches!(err, ScriptError::Exit { .. }));
}

#[tokio::test]
async fn test_runner_timeout() {
    let dir = tempfile::tempdir().unwrap();
    write_script(
        dir.path(),
        "tone_analysis",
        "sleep 5\necho '{\"success\": true, \"score\": 90, \"feedback\": \"late\"}'",
    );

    let runner = ScriptRunner::new("sh", dir.path(), Duration::from_secs(1));
    let err = runner
        .run::<ComponentScore>("tone_analysis", &["audio.wav"])
        .await
        .unwrap_err();

    match err {
        ScriptError::Timeout { timeout_secs, .. } => assert_eq!(timeout_secs, 1),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

// =============================================================================
// Fallback wrapper
// =============================================================================

#[tokio::test]
async fn test_fallback_passes_through_success() {
    let dir = tempfile::tempdir().unwrap();
    write_healthy_scripts(dir.path());

    let score = score_with_fallback(&runner(dir.path()), "tone_analysis", &["audio.wav"], 50.0)
        .await;

    assert_eq!(score.score, 90.0);
    assert_eq!(score.feedback, "Warm tone");
}

#[tokio::test]
async fn test_fallback_substitutes_default_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "tone_analysis", "echo crashed >&2\nexit 1");

    let score = score_with_fallback(&runner(dir.path()), "tone_analysis", &["audio.wav"], 50.0)
        .await;

    assert_eq!(score.score, 50.0);
    assert!(score.feedback.starts_with("Analysis could not be completed."));
    assert!(score.feedback.contains("crashed"));
}

// =============================================================================
// Fan-out aggregator
// =============================================================================

#[tokio::test]
async fn test_full_analysis_aggregates_scores() {
    let dir = tempfile::tempdir().unwrap();
    write_healthy_scripts(dir.path());

    let analysis = run_full_analysis(&runner(dir.path()), "audio.wav", "hello world").await;

    assert_eq!(analysis.fluency.score, 80.0);
    assert_eq!(analysis.pace.score, 60.0);
    assert_eq!(analysis.tone.score, 90.0);
    assert_eq!(analysis.confidence.score, 70.0);
    assert_eq!(analysis.overall_score, 75);
    assert_eq!(analysis.fluency.filler_words, vec!["um"]);
    assert_eq!(analysis.pace.wpm, Some(120.0));
}

#[tokio::test]
async fn test_full_analysis_survives_one_failing_component() {
    let dir = tempfile::tempdir().unwrap();
    write_healthy_scripts(dir.path());
    write_script(dir.path(), "tone_analysis", "echo no-mic >&2\nexit 2");

    let analysis = run_full_analysis(&runner(dir.path()), "audio.wav", "hello world").await;

    // Failed component degrades to the default; the other three are untouched.
    assert_eq!(analysis.tone.score, 50.0);
    assert!(analysis.tone.feedback.contains("Analysis could not be completed."));
    assert!(analysis.tone.feedback.contains("no-mic"));

    assert_eq!(analysis.fluency.score, 80.0);
    assert_eq!(analysis.pace.score, 60.0);
    assert_eq!(analysis.confidence.score, 70.0);
    assert_eq!(analysis.overall_score, 65);
}

// =============================================================================
// Coordinator
// =============================================================================

struct CoordinatorHarness {
    _dirs: (tempfile::TempDir, tempfile::TempDir),
    pool: sqlx::SqlitePool,
    coordinator: AnalysisCoordinator,
    user_id: Uuid,
    session_id: Uuid,
}

async fn setup_coordinator() -> CoordinatorHarness {
    let scripts_dir = tempfile::tempdir().unwrap();
    let db_dir = tempfile::tempdir().unwrap();
    write_healthy_scripts(scripts_dir.path());

    let pool = db::init_database(&db_dir.path().join("test.db")).await.unwrap();

    let user_id = Uuid::new_v4();
    let session = SpeechSession::new(
        user_id,
        "conference talk rehearsal".to_string(),
        "uploads/test.wav".to_string(),
    );
    let session_id = session.id;
    db::sessions::insert_session(&pool, &session).await.unwrap();

    let coordinator = AnalysisCoordinator::new(pool.clone(), runner(scripts_dir.path()));

    CoordinatorHarness {
        _dirs: (scripts_dir, db_dir),
        pool,
        coordinator,
        user_id,
        session_id,
    }
}

#[tokio::test]
async fn test_coordinator_full_run() {
    let h = setup_coordinator().await;

    let outcome = h.coordinator.analyze(h.user_id, h.session_id).await.unwrap();

    assert!(!outcome.already_existed);
    assert_eq!(outcome.transcription.as_deref(), Some("hello world"));
    assert_eq!(outcome.context, "conference talk rehearsal");
    assert_eq!(outcome.analysis.overall_score, 75);
    assert_eq!(outcome.analysis.session_id, h.session_id);

    // Transcription was persisted onto the session row.
    let session = db::sessions::fetch_session(&h.pool, h.session_id, h.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.transcription.as_deref(), Some("hello world"));

    // The analysis row was persisted.
    let stored = db::analyses::fetch_by_session(&h.pool, h.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, outcome.analysis.id);
    assert_eq!(stored.wpm, 120.0);
}

#[tokio::test]
async fn test_coordinator_is_idempotent() {
    let h = setup_coordinator().await;

    // Count transcription invocations through a side file the stub appends to.
    let scripts = h._dirs.0.path();
    write_script(
        scripts,
        "speech_to_text",
        r#"echo run >> "$0.calls"
echo '{"success": true, "transcription": "hello world"}'"#,
    );

    let first = h.coordinator.analyze(h.user_id, h.session_id).await.unwrap();
    let second = h.coordinator.analyze(h.user_id, h.session_id).await.unwrap();

    assert!(!first.already_existed);
    assert!(second.already_existed);
    assert_eq!(first.analysis.id, second.analysis.id);
    assert_eq!(first.analysis.overall_score, second.analysis.overall_score);

    let calls = std::fs::read_to_string(scripts.join("speech_to_text.py.calls")).unwrap();
    assert_eq!(calls.lines().count(), 1, "speech-to-text must run only once");
}

#[tokio::test]
async fn test_coordinator_unknown_session() {
    let h = setup_coordinator().await;

    let err = h
        .coordinator
        .analyze(h.user_id, Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_coordinator_foreign_session_is_not_found() {
    let h = setup_coordinator().await;

    let err = h
        .coordinator
        .analyze(Uuid::new_v4(), h.session_id)
        .await
        .unwrap_err();

    // Someone else's session is reported exactly like a missing one.
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_coordinator_transcription_failure_is_fatal() {
    let h = setup_coordinator().await;
    write_script(h._dirs.0.path(), "speech_to_text", "echo dead >&2\nexit 1");

    let err = h.coordinator.analyze(h.user_id, h.session_id).await.unwrap_err();
    assert!(matches!(err, ApiError::Transcription(_)));

    // Nothing was persisted: no transcription, no analysis row.
    let session = db::sessions::fetch_session(&h.pool, h.session_id, h.user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.transcription.is_none());
    assert!(db::analyses::fetch_by_session(&h.pool, h.session_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_coordinator_scoring_failures_do_not_fail_request() {
    let h = setup_coordinator().await;
    let scripts = h._dirs.0.path();
    write_script(scripts, "fluency_analysis", "exit 1");
    write_script(scripts, "pace_analysis", "exit 1");
    write_script(scripts, "tone_analysis", "exit 1");
    write_script(scripts, "confidence_analysis", "exit 1");

    let outcome = h.coordinator.analyze(h.user_id, h.session_id).await.unwrap();

    // Every component fell back; the result is complete and persisted.
    assert_eq!(outcome.analysis.overall_score, 50);
    assert_eq!(outcome.analysis.fluency_score, 50.0);
    assert!(outcome
        .analysis
        .feedback
        .confidence
        .starts_with("Analysis could not be completed."));
}
