use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::{
    Assessment, AssessmentPrerequisite, AssessmentQuestion, PrerequisiteRule, QuestionPayload,
};
use crate::db::types::{PrerequisiteType, QuestionType};

pub(crate) const COLUMNS: &str = "\
    id, course_id, title, description, time_limit_minutes, passing_score, max_attempts, \
    start_date, end_date, is_active, created_by, created_at, updated_at";

pub(crate) const QUESTION_COLUMNS: &str = "\
    id, assessment_id, question_type, prompt, points, order_index, payload, created_at, updated_at";

pub(crate) const PREREQUISITE_COLUMNS: &str =
    "id, assessment_id, prerequisite_type, prerequisite_data, created_at";

pub(crate) async fn find_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
) -> Result<Option<Assessment>, sqlx::Error> {
    sqlx::query_as::<_, Assessment>(&format!("SELECT {COLUMNS} FROM assessments WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_question_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
) -> Result<Option<AssessmentQuestion>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentQuestion>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM assessment_questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

#[derive(Debug)]
pub(crate) struct CreateAssessment<'a> {
    pub(crate) id: &'a str,
    pub(crate) course_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) time_limit_minutes: i32,
    pub(crate) passing_score: f64,
    pub(crate) max_attempts: Option<i32>,
    pub(crate) start_date: Option<PrimitiveDateTime>,
    pub(crate) end_date: Option<PrimitiveDateTime>,
    pub(crate) is_active: bool,
    pub(crate) created_by: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create<'e, E: PgExecutor<'e>>(
    executor: E,
    params: CreateAssessment<'_>,
) -> Result<Assessment, sqlx::Error> {
    sqlx::query_as::<_, Assessment>(&format!(
        "INSERT INTO assessments (
            id, course_id, title, description, time_limit_minutes, passing_score, max_attempts,
            start_date, end_date, is_active, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$12)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.time_limit_minutes)
    .bind(params.passing_score)
    .bind(params.max_attempts)
    .bind(params.start_date)
    .bind(params.end_date)
    .bind(params.is_active)
    .bind(params.created_by)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

#[derive(Debug)]
pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) assessment_id: &'a str,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: &'a str,
    pub(crate) points: f64,
    pub(crate) order_index: i32,
    pub(crate) payload: &'a QuestionPayload,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn insert_question<'e, E: PgExecutor<'e>>(
    executor: E,
    params: CreateQuestion<'_>,
) -> Result<AssessmentQuestion, sqlx::Error> {
    sqlx::query_as::<_, AssessmentQuestion>(&format!(
        "INSERT INTO assessment_questions (
            id, assessment_id, question_type, prompt, points, order_index, payload,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
        RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.assessment_id)
    .bind(params.question_type)
    .bind(params.prompt)
    .bind(params.points)
    .bind(params.order_index)
    .bind(Json(params.payload))
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn insert_prerequisite<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    assessment_id: &str,
    prerequisite_type: PrerequisiteType,
    rule: &PrerequisiteRule,
    now: PrimitiveDateTime,
) -> Result<AssessmentPrerequisite, sqlx::Error> {
    sqlx::query_as::<_, AssessmentPrerequisite>(&format!(
        "INSERT INTO assessment_prerequisites (
            id, assessment_id, prerequisite_type, prerequisite_data, created_at
        ) VALUES ($1,$2,$3,$4,$5)
        RETURNING {PREREQUISITE_COLUMNS}"
    ))
    .bind(id)
    .bind(assessment_id)
    .bind(prerequisite_type)
    .bind(Json(rule))
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_questions<'e, E: PgExecutor<'e>>(
    executor: E,
    assessment_id: &str,
) -> Result<Vec<AssessmentQuestion>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentQuestion>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM assessment_questions
         WHERE assessment_id = $1
         ORDER BY order_index"
    ))
    .bind(assessment_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_prerequisites(
    pool: &PgPool,
    assessment_id: &str,
) -> Result<Vec<AssessmentPrerequisite>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentPrerequisite>(&format!(
        "SELECT {PREREQUISITE_COLUMNS} FROM assessment_prerequisites WHERE assessment_id = $1"
    ))
    .bind(assessment_id)
    .fetch_all(pool)
    .await
}
