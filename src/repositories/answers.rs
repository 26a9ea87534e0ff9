use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::{AnswerPayload, AssessmentAnswer};
use crate::db::types::{AttemptStatus, GradingStatus, QuestionType};

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, question_id, answer, is_correct, points_earned, grading_status, \
    grader_feedback, graded_by, graded_at, created_at, updated_at";

#[derive(Debug)]
pub(crate) struct CreateAnswer<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) answer: &'a AnswerPayload,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: Option<f64>,
    pub(crate) grading_status: GradingStatus,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    params: CreateAnswer<'_>,
) -> Result<AssessmentAnswer, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAnswer>(&format!(
        "INSERT INTO assessment_answers (
            id, attempt_id, question_id, answer, is_correct, points_earned, grading_status,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.attempt_id)
    .bind(params.question_id)
    .bind(Json(params.answer))
    .bind(params.is_correct)
    .bind(params.points_earned)
    .bind(params.grading_status)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_attempt<'e, E: PgExecutor<'e>>(
    executor: E,
    attempt_id: &str,
) -> Result<Vec<AssessmentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAnswer>(&format!(
        "SELECT {COLUMNS} FROM assessment_answers WHERE attempt_id = $1 ORDER BY created_at, id"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
) -> Result<Option<AssessmentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAnswer>(&format!(
        "SELECT {COLUMNS} FROM assessment_answers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// One-shot manual grade: matches only `pending_review` rows, so re-grading
/// an already-graded answer affects zero rows and the caller can report the
/// conflict.
pub(crate) async fn apply_manual_grade<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    points_earned: f64,
    grader_feedback: Option<&str>,
    graded_by: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE assessment_answers
         SET points_earned = $2, grading_status = $3, grader_feedback = $4,
             graded_by = $5, graded_at = $6, updated_at = $6
         WHERE id = $1 AND grading_status = $7",
    )
    .bind(id)
    .bind(points_earned)
    .bind(GradingStatus::ManuallyGraded)
    .bind(grader_feedback)
    .bind(graded_by)
    .bind(now)
    .bind(GradingStatus::PendingReview)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// One row of the manual grading queue, oldest submission first.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PendingAnswerRow {
    pub(crate) answer_id: String,
    pub(crate) attempt_id: String,
    pub(crate) assessment_id: String,
    pub(crate) assessment_title: String,
    pub(crate) student_id: String,
    pub(crate) question_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) answer: Json<AnswerPayload>,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
}

pub(crate) async fn list_pending_review(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<PendingAnswerRow>, sqlx::Error> {
    sqlx::query_as::<_, PendingAnswerRow>(
        "SELECT an.id AS answer_id,
                an.attempt_id,
                at.assessment_id,
                a.title AS assessment_title,
                at.student_id,
                an.question_id,
                q.question_type,
                q.prompt,
                q.points,
                an.answer,
                at.completion_time AS submitted_at
         FROM assessment_answers an
         JOIN assessment_attempts at ON at.id = an.attempt_id
         JOIN assessments a ON a.id = at.assessment_id
         JOIN assessment_questions q ON q.id = an.question_id
         WHERE an.grading_status = $1 AND at.status = $2
         ORDER BY at.completion_time ASC NULLS LAST, an.created_at ASC
         LIMIT $3",
    )
    .bind(GradingStatus::PendingReview)
    .bind(AttemptStatus::GradingPending)
    .bind(limit)
    .fetch_all(pool)
    .await
}
