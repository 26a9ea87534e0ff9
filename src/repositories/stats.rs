use sqlx::PgPool;

use crate::db::types::{AttemptStatus, GradingStatus, QuestionType};

/// Read-side rollup for one assessment: attempt volume, average result and
/// pass rate over attempts that produced a percentage.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AssessmentStats {
    pub(crate) total_attempts: i64,
    pub(crate) completed_attempts: i64,
    pub(crate) average_percentage: Option<f64>,
    pub(crate) pass_rate: Option<f64>,
}

pub(crate) async fn assessment_stats(
    pool: &PgPool,
    assessment_id: &str,
) -> Result<AssessmentStats, sqlx::Error> {
    sqlx::query_as::<_, AssessmentStats>(
        "SELECT COUNT(*) AS total_attempts,
                COUNT(*) FILTER (WHERE status = $2) AS completed_attempts,
                AVG(percentage) AS average_percentage,
                AVG(CASE WHEN passed THEN 1.0::float8 ELSE 0.0::float8 END)
                    FILTER (WHERE passed IS NOT NULL) AS pass_rate
         FROM assessment_attempts
         WHERE assessment_id = $1",
    )
    .bind(assessment_id)
    .bind(AttemptStatus::Completed)
    .fetch_one(pool)
    .await
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct QuestionStats {
    pub(crate) question_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) answer_count: i64,
    pub(crate) average_points: Option<f64>,
    pub(crate) correct_rate: Option<f64>,
}

pub(crate) async fn question_stats(
    pool: &PgPool,
    assessment_id: &str,
) -> Result<Vec<QuestionStats>, sqlx::Error> {
    sqlx::query_as::<_, QuestionStats>(
        "SELECT q.id AS question_id,
                q.question_type,
                q.prompt,
                q.points,
                COUNT(an.id) AS answer_count,
                AVG(an.points_earned) AS average_points,
                AVG(CASE WHEN an.is_correct THEN 1.0::float8 ELSE 0.0::float8 END)
                    FILTER (WHERE an.is_correct IS NOT NULL) AS correct_rate
         FROM assessment_questions q
         LEFT JOIN assessment_answers an
                ON an.question_id = q.id AND an.grading_status <> $2
         WHERE q.assessment_id = $1
         GROUP BY q.id, q.question_type, q.prompt, q.points, q.order_index
         ORDER BY q.order_index",
    )
    .bind(assessment_id)
    .bind(GradingStatus::PendingReview)
    .fetch_all(pool)
    .await
}
