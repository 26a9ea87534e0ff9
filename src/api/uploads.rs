use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::upload::{session_to_response, CreateUploadRequest, UploadSessionResponse};
use crate::services::upload_sessions;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/:session_id", get(get_session))
        .route("/:session_id/chunks/:chunk_number", put(receive_chunk))
        .route("/:session_id/complete", post(complete_session))
}

/// Body limit for chunk uploads, with headroom for the multipart framing.
pub(crate) fn chunk_body_limit(max_chunk_size_mb: u64) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_chunk_size_mb as usize * 1024 * 1024 + 4096)
}

async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateUploadRequest>,
) -> Result<(StatusCode, Json<UploadSessionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let session = upload_sessions::create_session(
        &state,
        &payload.student_id,
        &payload.filename,
        payload.total_chunks,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(session_to_response(session))))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<UploadSessionResponse>, ApiError> {
    let session = repositories::upload_sessions::find_by_id(state.db(), &session_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch upload session"))?
        .ok_or(ApiError::NotFound {
            code: "invalid_session",
            detail: "upload session not found".to_string(),
        })?;

    Ok(Json(session_to_response(session)))
}

async fn receive_chunk(
    State(state): State<AppState>,
    Path((session_id, chunk_number)): Path<(String, i32)>,
    mut multipart: Multipart,
) -> Result<Json<UploadSessionResponse>, ApiError> {
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("chunk") {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read chunk: {e}")))?;
            bytes = Some(data.to_vec());
        }
    }

    let bytes = bytes
        .ok_or_else(|| ApiError::BadRequest("multipart field 'chunk' is required".to_string()))?;

    let session =
        upload_sessions::receive_chunk(&state, &session_id, chunk_number, bytes).await?;

    Ok(Json(session_to_response(session)))
}

async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<(StatusCode, Json<UploadSessionResponse>), ApiError> {
    let session = upload_sessions::request_assembly(&state, &session_id).await?;
    Ok((StatusCode::ACCEPTED, Json(session_to_response(session))))
}
