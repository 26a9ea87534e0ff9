use thiserror::Error;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{AnswerPayload, AssessmentAnswer, AssessmentAttempt, QuestionPayload};
use crate::db::types::{AttemptStatus, GradingStatus};
use crate::repositories;
use crate::services::attempt_timing;
use crate::services::auto_grading::{self, AutoGradeError};
use crate::services::prerequisites::{self, UnmetPrerequisite};
use crate::services::scoring;

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("assessment not found")]
    AssessmentNotFound,
    #[error("attempt not found")]
    AttemptNotFound,
    #[error("student is not enrolled in this course")]
    NotEnrolled,
    #[error("assessment is not available")]
    NotAvailable,
    #[error("maximum of {max_attempts} attempt(s) reached")]
    MaxAttemptsExceeded { max_attempts: i32 },
    #[error("{} prerequisite(s) not met", .0.len())]
    PrerequisitesNotMet(Vec<UnmetPrerequisite>),
    #[error("another attempt was started concurrently")]
    ConcurrentStart,
    #[error("attempt belongs to another student")]
    NotYourAttempt,
    #[error("attempt is already {0:?}")]
    AlreadySubmitted(AttemptStatus),
    #[error("time limit exceeded")]
    TimeLimitExceeded,
    #[error("question {0} does not belong to this assessment")]
    QuestionNotFound(String),
    #[error("duplicate answer for question {0}")]
    DuplicateAnswer(String),
    #[error("invalid answer for question {question_id}: {reason}")]
    InvalidAnswer { question_id: String, reason: String },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug)]
pub(crate) struct SubmittedAnswer {
    pub(crate) question_id: String,
    pub(crate) answer: AnswerPayload,
}

#[derive(Debug)]
pub(crate) struct SubmissionOutcome {
    pub(crate) attempt: AssessmentAttempt,
    pub(crate) answers: Vec<AssessmentAnswer>,
}

/// Start a new attempt: enrollment, availability-window, attempt-count and
/// prerequisite gates, then an `in_progress` row with the next attempt
/// number. The unique index on (assessment, student, attempt_number) is the
/// backstop against concurrent starts.
pub(crate) async fn start(
    state: &AppState,
    assessment_id: &str,
    student_id: &str,
) -> Result<AssessmentAttempt, AttemptError> {
    let assessment = repositories::assessments::find_by_id(state.db(), assessment_id)
        .await?
        .ok_or(AttemptError::AssessmentNotFound)?;

    if !repositories::enrollments::is_enrolled(state.db(), student_id, &assessment.course_id)
        .await?
    {
        return Err(AttemptError::NotEnrolled);
    }

    let now = primitive_now_utc();
    if !attempt_timing::is_available(&assessment, now) {
        return Err(AttemptError::NotAvailable);
    }

    let prerequisite_rows =
        repositories::assessments::list_prerequisites(state.db(), assessment_id).await?;
    if !prerequisite_rows.is_empty() {
        let ctx = prerequisites::load_context(
            state.db(),
            &assessment,
            student_id,
            &prerequisite_rows,
        )
        .await?;
        let unmet = prerequisites::check(&prerequisite_rows, &ctx);
        if !unmet.is_empty() {
            return Err(AttemptError::PrerequisitesNotMet(unmet));
        }
    }

    let mut tx = state.db().begin().await?;

    let prior_count =
        repositories::attempts::count_for_student(&mut *tx, assessment_id, student_id).await?;
    if let Some(max_attempts) = assessment.max_attempts {
        if prior_count >= max_attempts as i64 {
            return Err(AttemptError::MaxAttemptsExceeded { max_attempts });
        }
    }

    let created = repositories::attempts::create(
        &mut *tx,
        &Uuid::new_v4().to_string(),
        assessment_id,
        student_id,
        prior_count as i32 + 1,
        now,
    )
    .await
    .map_err(|err| match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => AttemptError::ConcurrentStart,
        _ => AttemptError::Db(err),
    })?;

    tx.commit().await?;

    metrics::counter!("attempts_started_total").increment(1);
    tracing::info!(assessment_id, student_id, attempt_number = created.attempt_number, "Attempt started");

    Ok(created)
}

/// Submit a live attempt: grade what the machine can grade, park the rest
/// for review, and persist attempt + answers as one transaction.
pub(crate) async fn submit(
    state: &AppState,
    attempt_id: &str,
    student_id: &str,
    submitted: Vec<SubmittedAnswer>,
) -> Result<SubmissionOutcome, AttemptError> {
    let now = primitive_now_utc();
    let mut tx = state.db().begin().await?;

    let attempt = repositories::attempts::find_by_id_for_update(&mut *tx, attempt_id)
        .await?
        .ok_or(AttemptError::AttemptNotFound)?;

    if attempt.student_id != student_id {
        return Err(AttemptError::NotYourAttempt);
    }

    if attempt.status != AttemptStatus::InProgress {
        return Err(AttemptError::AlreadySubmitted(attempt.status));
    }

    let assessment = repositories::assessments::find_by_id(&mut *tx, &attempt.assessment_id)
        .await?
        .ok_or(AttemptError::AssessmentNotFound)?;

    if attempt_timing::is_expired(&attempt, assessment.time_limit_minutes, now) {
        return Err(AttemptError::TimeLimitExceeded);
    }

    let questions =
        repositories::assessments::list_questions(&mut *tx, &attempt.assessment_id).await?;
    let by_id: std::collections::HashMap<&str, &crate::db::models::AssessmentQuestion> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();

    let mut seen = std::collections::HashSet::new();
    let mut answers = Vec::with_capacity(submitted.len());

    for entry in &submitted {
        let question = by_id
            .get(entry.question_id.as_str())
            .copied()
            .ok_or_else(|| AttemptError::QuestionNotFound(entry.question_id.clone()))?;

        if !seen.insert(question.id.clone()) {
            return Err(AttemptError::DuplicateAnswer(question.id.clone()));
        }

        let (is_correct, points_earned, grading_status) = if question
            .question_type
            .is_auto_gradable()
        {
            let graded = auto_grading::grade(question, &entry.answer).map_err(|err| {
                grade_error_to_invalid(question.id.clone(), err)
            })?;
            (Some(graded.is_correct), Some(graded.points_earned), GradingStatus::AutoGraded)
        } else {
            match (&question.payload.0, &entry.answer) {
                (
                    QuestionPayload::ShortAnswer { .. } | QuestionPayload::Essay { .. },
                    AnswerPayload::Text { .. },
                ) => (None, None, GradingStatus::PendingReview),
                _ => {
                    return Err(AttemptError::InvalidAnswer {
                        question_id: question.id.clone(),
                        reason: "expected a text answer".to_string(),
                    })
                }
            }
        };

        let created = repositories::answers::insert(
            &mut *tx,
            repositories::answers::CreateAnswer {
                id: &Uuid::new_v4().to_string(),
                attempt_id,
                question_id: &question.id,
                answer: &entry.answer,
                is_correct,
                points_earned,
                grading_status,
                now,
            },
        )
        .await?;
        answers.push(created);
    }

    let summary = scoring::recompute(&questions, &answers, assessment.passing_score);
    let any_pending =
        answers.iter().any(|answer| answer.grading_status == GradingStatus::PendingReview);
    let status =
        if any_pending { AttemptStatus::GradingPending } else { AttemptStatus::Completed };

    let time_taken_seconds =
        (now.assume_utc() - attempt.start_time.assume_utc()).whole_seconds().max(0);

    let updated = repositories::attempts::finalize_submission(
        &mut *tx,
        attempt_id,
        status,
        now,
        time_taken_seconds,
        &summary,
        now,
    )
    .await?;
    if !updated {
        // Lost a race with the expiry sweep between lock acquisition attempts.
        return Err(AttemptError::AlreadySubmitted(attempt.status));
    }

    tx.commit().await?;

    let label = match status {
        AttemptStatus::GradingPending => "grading_pending",
        _ => "completed",
    };
    metrics::counter!("attempts_submitted_total", "status" => label).increment(1);
    tracing::info!(attempt_id, status = ?status, "Attempt submitted");

    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await?
        .ok_or(AttemptError::AttemptNotFound)?;

    Ok(SubmissionOutcome { attempt, answers })
}

fn grade_error_to_invalid(question_id: String, err: AutoGradeError) -> AttemptError {
    AttemptError::InvalidAnswer { question_id, reason: err.to_string() }
}
