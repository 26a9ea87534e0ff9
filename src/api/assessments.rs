use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::repositories;
use crate::schemas::assessment::{
    assessment_to_response, stats_to_response, AssessmentCreate, AssessmentResponse,
    AssessmentStatsResponse,
};
use crate::schemas::attempt::{attempt_to_response, AttemptResponse, StartAttemptRequest};
use crate::services::attempt_flow;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_assessment))
        .route("/:assessment_id", get(get_assessment))
        .route("/:assessment_id/stats", get(get_assessment_stats))
        .route("/:assessment_id/attempts", post(start_attempt).get(list_attempts))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListAttemptsQuery {
    student_id: String,
}

async fn create_assessment(
    State(state): State<AppState>,
    Json(payload): Json<AssessmentCreate>,
) -> Result<(StatusCode, Json<AssessmentResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let start_date = payload.start_date.map(to_primitive_utc);
    let end_date = payload.end_date.map(to_primitive_utc);

    // An availability window needs both ends, in order.
    match (start_date, end_date) {
        (Some(start), Some(end)) if end <= start => {
            return Err(ApiError::BadRequest("end_date must be after start_date".to_string()));
        }
        (Some(_), None) => {
            return Err(ApiError::BadRequest(
                "end_date is required when start_date is set".to_string(),
            ));
        }
        _ => {}
    }

    if payload.questions.is_empty() {
        return Err(ApiError::BadRequest("at least one question is required".to_string()));
    }

    let mut orders = std::collections::HashSet::new();
    for question in &payload.questions {
        question.validate_shape().map_err(ApiError::BadRequest)?;
        if !orders.insert(question.order_index) {
            return Err(ApiError::BadRequest(format!(
                "duplicate question order {}",
                question.order_index
            )));
        }
    }

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let assessment = repositories::assessments::create(
        &mut *tx,
        repositories::assessments::CreateAssessment {
            id: &Uuid::new_v4().to_string(),
            course_id: &payload.course_id,
            title: &payload.title,
            description: payload.description.as_deref(),
            time_limit_minutes: payload.time_limit_minutes,
            passing_score: payload.passing_score,
            max_attempts: payload.max_attempts,
            start_date,
            end_date,
            is_active: payload.is_active,
            created_by: &payload.created_by,
            now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create assessment"))?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    for question in &payload.questions {
        let question_type = question.payload.question_type();
        let created = repositories::assessments::insert_question(
            &mut *tx,
            repositories::assessments::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                assessment_id: &assessment.id,
                question_type,
                prompt: &question.prompt,
                points: question.points,
                order_index: question.order_index,
                payload: &question.payload,
                now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;
        questions.push(created);
    }

    for prerequisite in &payload.prerequisites {
        repositories::assessments::insert_prerequisite(
            &mut *tx,
            &Uuid::new_v4().to_string(),
            &assessment.id,
            prerequisite.rule.prerequisite_type(),
            &prerequisite.rule,
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create prerequisite"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok((StatusCode::CREATED, Json(assessment_to_response(assessment, questions))))
}

async fn get_assessment(
    State(state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    let assessment = repositories::assessments::find_by_id(state.db(), &assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assessment"))?
        .ok_or(ApiError::NotFound {
            code: "assessment_not_found",
            detail: "assessment not found".to_string(),
        })?;

    let questions = repositories::assessments::list_questions(state.db(), &assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    Ok(Json(assessment_to_response(assessment, questions)))
}

async fn get_assessment_stats(
    State(state): State<AppState>,
    Path(assessment_id): Path<String>,
) -> Result<Json<AssessmentStatsResponse>, ApiError> {
    let assessment = repositories::assessments::find_by_id(state.db(), &assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assessment"))?;
    if assessment.is_none() {
        return Err(ApiError::NotFound {
            code: "assessment_not_found",
            detail: "assessment not found".to_string(),
        });
    }

    let stats = repositories::stats::assessment_stats(state.db(), &assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to aggregate attempt stats"))?;
    let questions = repositories::stats::question_stats(state.db(), &assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to aggregate question stats"))?;

    Ok(Json(stats_to_response(stats, questions)))
}

async fn list_attempts(
    State(state): State<AppState>,
    Path(assessment_id): Path<String>,
    Query(params): Query<ListAttemptsQuery>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let attempts = repositories::attempts::list_for_student(
        state.db(),
        &assessment_id,
        &params.student_id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    Ok(Json(
        attempts.into_iter().map(|attempt| attempt_to_response(attempt, Vec::new())).collect(),
    ))
}

async fn start_attempt(
    State(state): State<AppState>,
    Path(assessment_id): Path<String>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    if payload.student_id.trim().is_empty() {
        return Err(ApiError::BadRequest("student_id is required".to_string()));
    }

    let attempt = attempt_flow::start(&state, &assessment_id, &payload.student_id).await?;

    Ok((StatusCode::CREATED, Json(attempt_to_response(attempt, Vec::new()))))
}
