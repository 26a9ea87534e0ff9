use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::attempt::{attempt_to_response, AttemptResponse};
use crate::schemas::grading::{pending_to_response, GradeAnswerRequest, PendingAnswerResponse};
use crate::services::manual_grading;

#[derive(Debug, Deserialize)]
pub(crate) struct PendingQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(list_pending))
        .route("/answers/:answer_id", post(grade_answer))
}

async fn list_pending(
    State(state): State<AppState>,
    Query(params): Query<PendingQuery>,
) -> Result<Json<Vec<PendingAnswerResponse>>, ApiError> {
    let limit = params.limit.clamp(1, 500);
    let rows = manual_grading::list_pending(&state, limit).await?;
    Ok(Json(rows.into_iter().map(pending_to_response).collect()))
}

async fn grade_answer(
    State(state): State<AppState>,
    Path(answer_id): Path<String>,
    Json(payload): Json<GradeAnswerRequest>,
) -> Result<Json<AttemptResponse>, ApiError> {
    if payload.graded_by.trim().is_empty() {
        return Err(ApiError::BadRequest("graded_by is required".to_string()));
    }

    let outcome = manual_grading::grade_answer(
        &state,
        &answer_id,
        &payload.graded_by,
        payload.points_earned,
        payload.feedback.as_deref(),
    )
    .await?;

    Ok(Json(attempt_to_response(outcome.attempt, vec![outcome.answer])))
}
