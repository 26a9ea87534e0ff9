use std::collections::HashSet;

use sqlx::PgPool;

pub(crate) async fn is_enrolled(
    pool: &PgPool,
    student_id: &str,
    course_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM enrollments WHERE student_id = $1 AND course_id = $2",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

pub(crate) async fn progress_percentage(
    pool: &PgPool,
    student_id: &str,
    course_id: &str,
) -> Result<Option<f64>, sqlx::Error> {
    sqlx::query_scalar::<_, f64>(
        "SELECT progress_percentage FROM enrollments WHERE student_id = $1 AND course_id = $2",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

/// True when the student has a passed attempt for every other assessment of
/// the course. The assessment being started is excluded from the check.
pub(crate) async fn has_passed_all_quizzes(
    pool: &PgPool,
    student_id: &str,
    course_id: &str,
    excluding_assessment_id: &str,
) -> Result<bool, sqlx::Error> {
    let unpassed: Option<i32> = sqlx::query_scalar(
        "SELECT 1
         FROM assessments q
         WHERE q.course_id = $2
           AND q.id <> $3
           AND NOT EXISTS (
               SELECT 1 FROM assessment_attempts at
               WHERE at.assessment_id = q.id
                 AND at.student_id = $1
                 AND at.passed = TRUE
           )
         LIMIT 1",
    )
    .bind(student_id)
    .bind(course_id)
    .bind(excluding_assessment_id)
    .fetch_optional(pool)
    .await?;
    Ok(unpassed.is_none())
}

pub(crate) async fn completed_lessons(
    pool: &PgPool,
    student_id: &str,
    lesson_ids: &[String],
) -> Result<HashSet<String>, sqlx::Error> {
    if lesson_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT lesson_id FROM lesson_completions WHERE student_id = $1 AND lesson_id = ANY($2)",
    )
    .bind(student_id)
    .bind(lesson_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}
