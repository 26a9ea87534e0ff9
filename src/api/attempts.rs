use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::attempt::{attempt_to_response, AttemptResponse, SubmitAttemptRequest};
use crate::services::attempt_flow::{self, SubmittedAnswer};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:attempt_id", get(get_attempt))
        .route("/:attempt_id/submit", post(submit_attempt))
}

async fn get_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or(ApiError::NotFound {
            code: "attempt_not_found",
            detail: "attempt not found".to_string(),
        })?;

    let answers = repositories::answers::list_by_attempt(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;

    Ok(Json(attempt_to_response(attempt, answers)))
}

async fn submit_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<Json<AttemptResponse>, ApiError> {
    if payload.student_id.trim().is_empty() {
        return Err(ApiError::BadRequest("student_id is required".to_string()));
    }

    let submitted: Vec<SubmittedAnswer> = payload
        .answers
        .into_iter()
        .map(|entry| SubmittedAnswer { question_id: entry.question_id, answer: entry.answer })
        .collect();

    let outcome =
        attempt_flow::submit(&state, &attempt_id, &payload.student_id, submitted).await?;

    Ok(Json(attempt_to_response(outcome.attempt, outcome.answers)))
}
