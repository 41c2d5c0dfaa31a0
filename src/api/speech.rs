//! Speech session endpoints: upload, analyze, history, detail, delete
//!
//! All routes here sit behind [`super::require_user`]; the authenticated
//! caller arrives via request extensions, and every query is scoped to that
//! user's id.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analysis::AnalysisOutcome;
use crate::api::AuthUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{AnalysisRecord, SpeechSession};
use crate::upload;
use crate::AppState;

/// Default number of history entries per page.
const DEFAULT_HISTORY_LIMIT: i64 = 10;
/// Upper bound on history page size.
const MAX_HISTORY_LIMIT: i64 = 100;

/// POST /speech/upload (multipart: `audio` file + `context` text)
pub async fn upload_speech(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut audio: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut context: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart request: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => {
                let filename = field.file_name().unwrap_or("recording").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read audio field: {e}")))?;
                audio = Some((filename, content_type, data.to_vec()));
            }
            Some("context") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read context field: {e}")))?;
                context = Some(text);
            }
            _ => {}
        }
    }

    let (filename, content_type, data) = audio
        .ok_or_else(|| ApiError::BadRequest("No audio file provided".to_string()))?;

    let context = context
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Speech context is required".to_string()))?;

    upload::validate_audio_upload(&filename, content_type.as_deref(), &data)?;

    let stored_name = upload::storage_filename(user.id, &filename);
    let path = upload::store_upload(&state.config.upload_dir, &stored_name, &data).await?;

    let session = SpeechSession::new(user.id, context, path.display().to_string());

    if let Err(err) = db::sessions::insert_session(&state.db, &session).await {
        // The row never landed; don't leave an orphaned file behind.
        upload::remove_artifact(&session.audio_file_path).await;
        return Err(err);
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Speech uploaded successfully",
            "session": {
                "id": session.id,
                "context": session.context,
                "createdAt": session.created_at,
            },
        })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub session_id: Option<String>,
}

/// Analysis row plus the session fields the caller wants alongside it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzePayload {
    #[serde(flatten)]
    analysis: AnalysisRecord,
    transcription: Option<String>,
    context: String,
}

/// POST /speech/analyze
pub async fn analyze_speech(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<Json<Value>> {
    let session_id = req
        .session_id
        .ok_or_else(|| ApiError::BadRequest("Session ID is required".to_string()))?;

    // An unparseable id cannot match any session; report it the same way as
    // an absent one.
    let session_id = Uuid::parse_str(&session_id)
        .map_err(|_| ApiError::NotFound("Speech session not found".to_string()))?;

    let AnalysisOutcome {
        analysis,
        transcription,
        context,
        already_existed,
    } = state.coordinator.analyze(user.id, session_id).await?;

    let message = if already_existed {
        "Analysis already exists"
    } else {
        "Analysis completed successfully"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "analysis": AnalyzePayload {
            analysis,
            transcription,
            context,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /speech/history?limit=10&offset=0
pub async fn speech_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Value>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let history = db::sessions::list_history(&state.db, user.id, limit, offset).await?;

    Ok(Json(json!({
        "success": true,
        "history": history,
        "pagination": {
            "limit": limit,
            "offset": offset,
            "total": history.len(),
        },
    })))
}

/// GET /speech/:id
pub async fn get_speech(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let session = db::sessions::fetch_session(&state.db, id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Analysis not found".to_string()))?;

    let analysis = db::analyses::fetch_by_session(&state.db, id).await?;

    Ok(Json(json!({
        "success": true,
        "session": {
            "id": session.id,
            "context": session.context,
            "transcription": session.transcription,
            "createdAt": session.created_at,
        },
        "analysis": analysis,
    })))
}

/// DELETE /speech/:id
///
/// Removes the session row (the analysis row cascades with it), then cleans
/// up the audio artifact. File cleanup is best-effort: a failure is logged
/// but the delete still succeeds.
pub async fn delete_speech(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let session = db::sessions::fetch_session(&state.db, id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Speech session not found".to_string()))?;

    let deleted = db::sessions::delete_session(&state.db, id, user.id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Speech session not found".to_string()));
    }

    upload::remove_artifact(&session.audio_file_path).await;

    Ok(Json(json!({
        "success": true,
        "message": "Speech session deleted successfully",
    })))
}
