//! Upload validation and storage for audio recordings
//!
//! Uploads are checked against the allowed audio types before anything
//! touches disk. Stored files get a unique name derived from the upload
//! time, the owning user, and a sanitized version of the original name.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// File extensions accepted for uploaded recordings.
const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "wav", "webm", "ogg", "m4a", "mp4"];

/// Declared MIME types accepted for uploaded recordings.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/wav",
    "audio/wave",
    "audio/x-wav",
    "audio/webm",
    "audio/ogg",
    "audio/mp4",
    "audio/x-m4a",
    // mp4 recordings are often detected as video
    "video/mp4",
];

/// Check an upload against the allowed audio types.
///
/// A file passes if its extension, its declared content type, or its sniffed
/// content matches the allowed set. Browsers are inconsistent about which of
/// the three they get right, so any single match is accepted.
pub fn validate_audio_upload(
    filename: &str,
    content_type: Option<&str>,
    data: &[u8],
) -> ApiResult<()> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    if let Some(ext) = &extension {
        if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(());
        }
    }

    if let Some(declared) = content_type {
        if ALLOWED_MIME_TYPES.contains(&declared) {
            return Ok(());
        }
    }

    if let Some(kind) = infer::get(data) {
        if ALLOWED_MIME_TYPES.contains(&kind.mime_type()) {
            return Ok(());
        }
    }

    Err(ApiError::BadRequest(
        "Invalid file type. Only audio files are allowed (mp3, wav, webm, ogg, m4a, mp4)"
            .to_string(),
    ))
}

/// Build the unique on-disk name for a stored upload.
pub fn storage_filename(user_id: Uuid, original: &str) -> String {
    let sanitized: String = original
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{}-{}-{}", Utc::now().timestamp_millis(), user_id, sanitized)
}

/// Write upload bytes under the upload directory.
pub async fn store_upload(upload_dir: &Path, filename: &str, data: &[u8]) -> ApiResult<PathBuf> {
    tokio::fs::create_dir_all(upload_dir).await?;

    let path = upload_dir.join(filename);
    tokio::fs::write(&path, data).await?;

    debug!(path = %path.display(), bytes = data.len(), "stored uploaded audio");
    Ok(path)
}

/// Remove a stored artifact, logging rather than failing on error.
///
/// Used both for cleanup after a failed session insert and for the
/// best-effort file removal after a session delete.
pub async fn remove_artifact(path: &str) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        warn!(path, error = %err, "failed to remove audio artifact");
    }
}
