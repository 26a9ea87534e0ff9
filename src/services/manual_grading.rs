use thiserror::Error;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{AssessmentAnswer, AssessmentAttempt};
use crate::db::types::{AttemptStatus, GradingStatus};
use crate::repositories;
use crate::repositories::answers::PendingAnswerRow;
use crate::services::scoring;

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("answer not found")]
    AnswerNotFound,
    #[error("answer is already graded")]
    AlreadyGraded,
    #[error("points must be between 0 and {max_points}")]
    PointsOutOfRange { max_points: f64 },
    #[error("attempt not found for answer")]
    AttemptNotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug)]
pub(crate) struct GradeOutcome {
    pub(crate) answer: AssessmentAnswer,
    pub(crate) attempt: AssessmentAttempt,
}

pub(crate) async fn list_pending(
    state: &AppState,
    limit: i64,
) -> Result<Vec<PendingAnswerRow>, GradingError> {
    let rows = repositories::answers::list_pending_review(state.db(), limit).await?;
    Ok(rows)
}

/// Apply one manual grade. One-shot per answer: a second grade on the same
/// answer is a conflict, not an overwrite. The parent attempt is locked for
/// the whole transition so the recompute never races a sibling grade.
pub(crate) async fn grade_answer(
    state: &AppState,
    answer_id: &str,
    graded_by: &str,
    points_earned: f64,
    feedback: Option<&str>,
) -> Result<GradeOutcome, GradingError> {
    let now = primitive_now_utc();
    let mut tx = state.db().begin().await?;

    let answer = repositories::answers::find_by_id(&mut *tx, answer_id)
        .await?
        .ok_or(GradingError::AnswerNotFound)?;

    let attempt = repositories::attempts::find_by_id_for_update(&mut *tx, &answer.attempt_id)
        .await?
        .ok_or(GradingError::AttemptNotFound)?;

    let question = repositories::assessments::find_question_by_id(&mut *tx, &answer.question_id)
        .await?
        .ok_or(GradingError::AnswerNotFound)?;

    if answer.grading_status != GradingStatus::PendingReview {
        return Err(GradingError::AlreadyGraded);
    }

    if points_earned < 0.0 || points_earned > question.points {
        return Err(GradingError::PointsOutOfRange { max_points: question.points });
    }

    let applied = repositories::answers::apply_manual_grade(
        &mut *tx,
        answer_id,
        points_earned,
        feedback,
        graded_by,
        now,
    )
    .await?;
    if !applied {
        return Err(GradingError::AlreadyGraded);
    }

    let assessment = repositories::assessments::find_by_id(&mut *tx, &attempt.assessment_id)
        .await?
        .ok_or(GradingError::AttemptNotFound)?;
    let questions =
        repositories::assessments::list_questions(&mut *tx, &attempt.assessment_id).await?;
    let answers = repositories::answers::list_by_attempt(&mut *tx, &attempt.id).await?;

    let summary = scoring::recompute(&questions, &answers, assessment.passing_score);

    // The last pending answer flips the attempt out of grading_pending.
    let status = if summary.score.is_some() && attempt.status == AttemptStatus::GradingPending {
        AttemptStatus::Completed
    } else {
        attempt.status
    };

    repositories::attempts::apply_score(&mut *tx, &attempt.id, status, &summary, now).await?;

    tx.commit().await?;

    metrics::counter!("answers_manually_graded_total").increment(1);
    if status == AttemptStatus::Completed && attempt.status == AttemptStatus::GradingPending {
        metrics::counter!("attempts_grading_finalized_total").increment(1);
        tracing::info!(attempt_id = %attempt.id, "Attempt finalized after manual grading");
    }

    let answer = repositories::answers::find_by_id(state.db(), answer_id)
        .await?
        .ok_or(GradingError::AnswerNotFound)?;
    let attempt = repositories::attempts::find_by_id(state.db(), &attempt.id)
        .await?
        .ok_or(GradingError::AttemptNotFound)?;

    Ok(GradeOutcome { answer, attempt })
}
