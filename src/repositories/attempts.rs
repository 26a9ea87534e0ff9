use sqlx::{PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::AssessmentAttempt;
use crate::db::types::AttemptStatus;
use crate::services::scoring::ScoreSummary;

pub(crate) const COLUMNS: &str = "\
    id, assessment_id, student_id, attempt_number, status, start_time, completion_time, \
    time_taken_seconds, score, max_score, percentage, passed, created_at, updated_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<AssessmentAttempt>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAttempt>(&format!(
        "SELECT {COLUMNS} FROM assessment_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_id_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
) -> Result<Option<AssessmentAttempt>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAttempt>(&format!(
        "SELECT {COLUMNS} FROM assessment_attempts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn count_for_student<'e, E: PgExecutor<'e>>(
    executor: E,
    assessment_id: &str,
    student_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM assessment_attempts WHERE assessment_id = $1 AND student_id = $2",
    )
    .bind(assessment_id)
    .bind(student_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn create<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    assessment_id: &str,
    student_id: &str,
    attempt_number: i32,
    start_time: PrimitiveDateTime,
) -> Result<AssessmentAttempt, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAttempt>(&format!(
        "INSERT INTO assessment_attempts (
            id, assessment_id, student_id, attempt_number, status, start_time,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$6,$6)
        RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(assessment_id)
    .bind(student_id)
    .bind(attempt_number)
    .bind(AttemptStatus::InProgress)
    .bind(start_time)
    .fetch_one(executor)
    .await
}

/// Close out a submission: only ever fires on an `in_progress` row, so a
/// concurrent sweep or double submit cannot clobber a terminal state.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn finalize_submission<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    status: AttemptStatus,
    completion_time: PrimitiveDateTime,
    time_taken_seconds: i64,
    summary: &ScoreSummary,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE assessment_attempts
         SET status = $2, completion_time = $3, time_taken_seconds = $4,
             score = $5, max_score = $6, percentage = $7, passed = $8, updated_at = $9
         WHERE id = $1 AND status = $10",
    )
    .bind(id)
    .bind(status)
    .bind(completion_time)
    .bind(time_taken_seconds)
    .bind(summary.score)
    .bind(summary.max_score)
    .bind(summary.percentage)
    .bind(summary.passed)
    .bind(now)
    .bind(AttemptStatus::InProgress)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Re-apply an aggregated score after a manual grade, optionally flipping the
/// attempt out of `grading_pending`.
pub(crate) async fn apply_score<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    status: AttemptStatus,
    summary: &ScoreSummary,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE assessment_attempts
         SET status = $2, score = $3, max_score = $4, percentage = $5, passed = $6, updated_at = $7
         WHERE id = $1",
    )
    .bind(id)
    .bind(status)
    .bind(summary.score)
    .bind(summary.max_score)
    .bind(summary.percentage)
    .bind(summary.passed)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OpenAttemptDeadline {
    pub(crate) id: String,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) time_limit_minutes: i32,
}

pub(crate) async fn list_open_with_time_limit(
    pool: &PgPool,
) -> Result<Vec<OpenAttemptDeadline>, sqlx::Error> {
    sqlx::query_as::<_, OpenAttemptDeadline>(
        "SELECT at.id, at.start_time, a.time_limit_minutes
         FROM assessment_attempts at
         JOIN assessments a ON a.id = at.assessment_id
         WHERE at.status = $1",
    )
    .bind(AttemptStatus::InProgress)
    .fetch_all(pool)
    .await
}

/// Passive-expiry transition for the sweep: scores stay null, the deadline
/// becomes the completion time. Guarded on `in_progress` so a submission that
/// commits first wins.
pub(crate) async fn time_out(
    pool: &PgPool,
    id: &str,
    deadline: PrimitiveDateTime,
    time_taken_seconds: i64,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE assessment_attempts
         SET status = $2, completion_time = $3, time_taken_seconds = $4, updated_at = $5
         WHERE id = $1 AND status = $6",
    )
    .bind(id)
    .bind(AttemptStatus::TimedOut)
    .bind(deadline)
    .bind(time_taken_seconds)
    .bind(now)
    .bind(AttemptStatus::InProgress)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn list_for_student(
    pool: &PgPool,
    assessment_id: &str,
    student_id: &str,
) -> Result<Vec<AssessmentAttempt>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentAttempt>(&format!(
        "SELECT {COLUMNS} FROM assessment_attempts
         WHERE assessment_id = $1 AND student_id = $2
         ORDER BY attempt_number"
    ))
    .bind(assessment_id)
    .bind(student_id)
    .fetch_all(pool)
    .await
}
