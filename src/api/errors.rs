use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::attempt_flow::AttemptError;
use crate::services::manual_grading::GradingError;
use crate::services::prerequisites::UnmetPrerequisite;
use crate::services::upload_sessions::UploadError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    code: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unmet_prerequisites: Option<Vec<UnmetPrerequisite>>,
}

/// API failure shape: every domain error maps to a stable machine-readable
/// code plus an HTTP status, so frontends can render the taxonomy
/// consistently.
#[derive(Debug)]
pub(crate) enum ApiError {
    Forbidden { code: &'static str, detail: String },
    PrerequisitesNotMet(Vec<UnmetPrerequisite>),
    BadRequest(String),
    NotFound { code: &'static str, detail: String },
    Conflict { code: &'static str, detail: String },
    UnprocessableEntity { code: &'static str, detail: String },
    Gone { code: &'static str, detail: String },
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail, unmet) = match self {
            ApiError::Forbidden { code, detail } => {
                (StatusCode::FORBIDDEN, code, detail, None)
            }
            ApiError::PrerequisitesNotMet(unmet) => (
                StatusCode::FORBIDDEN,
                "prerequisites_not_met",
                format!("{} prerequisite(s) not met", unmet.len()),
                Some(unmet),
            ),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "bad_request", detail, None)
            }
            ApiError::NotFound { code, detail } => (StatusCode::NOT_FOUND, code, detail, None),
            ApiError::Conflict { code, detail } => (StatusCode::CONFLICT, code, detail, None),
            ApiError::UnprocessableEntity { code, detail } => {
                (StatusCode::UNPROCESSABLE_ENTITY, code, detail, None)
            }
            ApiError::Gone { code, detail } => (StatusCode::GONE, code, detail, None),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", detail, None)
            }
        };

        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                code,
                detail,
                unmet_prerequisites: unmet,
            }),
        )
            .into_response()
    }
}

impl From<AttemptError> for ApiError {
    fn from(err: AttemptError) -> Self {
        let detail = err.to_string();
        match err {
            AttemptError::AssessmentNotFound => {
                ApiError::NotFound { code: "assessment_not_found", detail }
            }
            AttemptError::AttemptNotFound => {
                ApiError::NotFound { code: "attempt_not_found", detail }
            }
            AttemptError::NotEnrolled => ApiError::Forbidden { code: "not_enrolled", detail },
            AttemptError::NotAvailable => {
                ApiError::Forbidden { code: "assessment_not_available", detail }
            }
            AttemptError::MaxAttemptsExceeded { .. } => {
                ApiError::Conflict { code: "max_attempts_exceeded", detail }
            }
            AttemptError::PrerequisitesNotMet(unmet) => ApiError::PrerequisitesNotMet(unmet),
            AttemptError::ConcurrentStart => {
                ApiError::Conflict { code: "concurrent_start", detail }
            }
            AttemptError::NotYourAttempt => {
                ApiError::Forbidden { code: "not_your_attempt", detail }
            }
            AttemptError::AlreadySubmitted(_) => {
                ApiError::Conflict { code: "already_submitted", detail }
            }
            AttemptError::TimeLimitExceeded => {
                ApiError::Gone { code: "time_limit_exceeded", detail }
            }
            AttemptError::QuestionNotFound(_) => {
                ApiError::UnprocessableEntity { code: "question_not_found", detail }
            }
            AttemptError::DuplicateAnswer(_) => {
                ApiError::Conflict { code: "duplicate_answer", detail }
            }
            AttemptError::InvalidAnswer { .. } => {
                ApiError::UnprocessableEntity { code: "invalid_answer", detail }
            }
            AttemptError::Db(db_err) => ApiError::internal(db_err, "Attempt operation failed"),
        }
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        let detail = err.to_string();
        match err {
            GradingError::AnswerNotFound => {
                ApiError::NotFound { code: "answer_not_found", detail }
            }
            GradingError::AttemptNotFound => {
                ApiError::NotFound { code: "attempt_not_found", detail }
            }
            GradingError::AlreadyGraded => ApiError::Conflict { code: "already_graded", detail },
            GradingError::PointsOutOfRange { .. } => {
                ApiError::UnprocessableEntity { code: "invalid_grading_data", detail }
            }
            GradingError::Db(db_err) => ApiError::internal(db_err, "Grading operation failed"),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let detail = err.to_string();
        match err {
            UploadError::SessionNotFound => {
                ApiError::NotFound { code: "invalid_session", detail }
            }
            UploadError::SessionClosed(_) => ApiError::Conflict { code: "invalid_session", detail },
            UploadError::SessionExpired => ApiError::Gone { code: "session_expired", detail },
            UploadError::InvalidChunk { .. } => {
                ApiError::UnprocessableEntity { code: "invalid_chunk", detail }
            }
            UploadError::ChunkTooLarge { .. } => {
                ApiError::UnprocessableEntity { code: "chunk_too_large", detail }
            }
            UploadError::InvalidTotalChunks { .. } => {
                ApiError::UnprocessableEntity { code: "invalid_total_chunks", detail }
            }
            UploadError::Incomplete { .. } => {
                ApiError::UnprocessableEntity { code: "incomplete_upload", detail }
            }
            UploadError::StorageUnavailable => {
                ApiError::Internal("Object storage is not configured".to_string())
            }
            UploadError::Storage(storage_err) => {
                ApiError::internal(storage_err, "Storage operation failed")
            }
            UploadError::Db(db_err) => ApiError::internal(db_err, "Upload operation failed"),
        }
    }
}
