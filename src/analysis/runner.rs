//! Subprocess invoker for the external analysis scripts
//!
//! Each analysis lives in an external script executed as
//! `<interpreter> <scripts_dir>/<name>.py <args...>`. A script writes exactly
//! one JSON document to stdout and exits 0; semantic failures (for example
//! unintelligible audio) are reported in-band as
//! `{"success": false, "error": "<message>"}` rather than via the exit code.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from a single script invocation.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The interpreter process could not be started at all.
    #[error("failed to launch {script}: {source}")]
    Launch {
        script: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a non-zero status.
    #[error("{script} exited with code {code}: {stderr}")]
    Exit {
        script: String,
        code: i32,
        stderr: String,
    },

    /// The process ran longer than the configured bound.
    #[error("{script} timed out after {timeout_secs}s")]
    Timeout { script: String, timeout_secs: u64 },

    /// Stdout was not a single JSON document of the expected shape.
    #[error("{script} produced invalid output: {message}")]
    MalformedOutput {
        script: String,
        message: String,
        raw: String,
    },

    /// The script itself reported failure via its `success` field.
    #[error("{script}: {message}")]
    Reported { script: String, message: String },
}

/// Launches analysis scripts and parses their JSON output.
///
/// Holds the interpreter path, the directory the scripts live in, and the
/// per-invocation timeout. Cheap to clone; no state is shared between
/// invocations.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: PathBuf,
    scripts_dir: PathBuf,
    timeout: Duration,
}

impl ScriptRunner {
    pub fn new(
        interpreter: impl Into<PathBuf>,
        scripts_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            scripts_dir: scripts_dir.into(),
            timeout,
        }
    }

    /// Run one script and deserialize its stdout into `T`.
    ///
    /// # Errors
    /// Returns a [`ScriptError`] if the process cannot be launched, exits
    /// non-zero, exceeds the timeout, emits unparseable output, or reports
    /// its own failure in-band.
    pub async fn run<T: DeserializeOwned>(
        &self,
        script: &str,
        args: &[&str],
    ) -> Result<T, ScriptError> {
        let script_path = self.scripts_dir.join(format!("{script}.py"));

        debug!(
            script,
            path = %script_path.display(),
            args = args.len(),
            "invoking analysis script"
        );

        let child = Command::new(&self.interpreter)
            .arg(&script_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ScriptError::Launch {
                script: script.to_string(),
                source,
            })?;

        // On timeout the child is left to finish on its own; its exit is
        // reaped in the background. Killing mid-write could leave partial
        // output and the scripts have no side effects beyond stdout.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ScriptError::Launch {
                    script: script.to_string(),
                    source,
                })
            }
            Err(_) => {
                let timeout_secs = self.timeout.as_secs();
                warn!(script, timeout_secs, "analysis script timed out");
                return Err(ScriptError::Timeout {
                    script: script.to_string(),
                    timeout_secs,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        debug!(
            script,
            code = output.status.code(),
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "analysis script exited"
        );

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(script, code, stderr = %stderr, "analysis script failed");
            return Err(ScriptError::Exit {
                script: script.to_string(),
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        let value: Value =
            serde_json::from_str(stdout.trim()).map_err(|e| ScriptError::MalformedOutput {
                script: script.to_string(),
                message: e.to_string(),
                raw: stdout.to_string(),
            })?;

        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("script reported failure")
                .to_string();
            return Err(ScriptError::Reported {
                script: script.to_string(),
                message,
            });
        }

        serde_json::from_value(value).map_err(|e| ScriptError::MalformedOutput {
            script: script.to_string(),
            message: e.to_string(),
            raw: stdout.to_string(),
        })
    }
}
