use std::sync::{Arc, OnceLock};

use sqlx::types::Json;
use time::{Date, PrimitiveDateTime, Time};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::db::models::{
    AnswerPayload, Assessment, AssessmentAnswer, AssessmentAttempt, AssessmentPrerequisite,
    AssessmentQuestion, PrerequisiteRule, QuestionOption, QuestionPayload, UploadSession,
    VideoQuality,
};
use crate::db::types::{
    AttemptStatus, GradingStatus, QualityStatus, QualityTier, QuestionType, UploadStatus,
};

/// Serializes tests that mutate process environment (settings loading).
pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn dt(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
) -> PrimitiveDateTime {
    let date = Date::from_calendar_date(year, time::Month::try_from(month).unwrap(), day).unwrap();
    let time = Time::from_hms(hour, minute, second).unwrap();
    PrimitiveDateTime::new(date, time)
}

fn fixture_now() -> PrimitiveDateTime {
    dt(2026, 1, 15, 12, 0, 0)
}

/// Multiple-choice payload with options a/b/c and the given correct id.
pub(crate) fn mc_payload(correct: &str) -> QuestionPayload {
    QuestionPayload::MultipleChoice {
        options: vec![
            QuestionOption { id: "a".to_string(), text: "first".to_string() },
            QuestionOption { id: "b".to_string(), text: "second".to_string() },
            QuestionOption { id: "c".to_string(), text: "third".to_string() },
        ],
        correct_option_id: correct.to_string(),
    }
}

pub(crate) fn make_assessment(time_limit_minutes: i32, passing_score: f64) -> Assessment {
    let now = fixture_now();
    Assessment {
        id: Uuid::new_v4().to_string(),
        course_id: "course-1".to_string(),
        title: "Unit test".to_string(),
        description: None,
        time_limit_minutes,
        passing_score,
        max_attempts: None,
        start_date: None,
        end_date: None,
        is_active: true,
        created_by: "teacher-1".to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn make_question(
    question_type: QuestionType,
    points: f64,
    payload: QuestionPayload,
) -> AssessmentQuestion {
    let now = fixture_now();
    AssessmentQuestion {
        id: Uuid::new_v4().to_string(),
        assessment_id: "assessment-1".to_string(),
        question_type,
        prompt: "prompt".to_string(),
        points,
        order_index: 1,
        payload: Json(payload),
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn make_attempt(id: &str, start_time: PrimitiveDateTime) -> AssessmentAttempt {
    AssessmentAttempt {
        id: id.to_string(),
        assessment_id: "assessment-1".to_string(),
        student_id: "student-1".to_string(),
        attempt_number: 1,
        status: AttemptStatus::InProgress,
        start_time,
        completion_time: None,
        time_taken_seconds: None,
        score: None,
        max_score: None,
        percentage: None,
        passed: None,
        created_at: start_time,
        updated_at: start_time,
    }
}

/// Answer fixture: graded when `points_earned` is set, pending otherwise.
pub(crate) fn make_answer(
    question: &AssessmentQuestion,
    points_earned: Option<f64>,
) -> AssessmentAnswer {
    let now = fixture_now();
    let payload = match question.question_type {
        QuestionType::MultipleChoice => AnswerPayload::Choice { option_id: "a".to_string() },
        QuestionType::TrueFalse => AnswerPayload::Boolean { value: true },
        QuestionType::ShortAnswer | QuestionType::Essay => {
            AnswerPayload::Text { text: "answer text".to_string() }
        }
    };
    let grading_status = match (points_earned, question.question_type.is_auto_gradable()) {
        (Some(_), true) => GradingStatus::AutoGraded,
        (Some(_), false) => GradingStatus::ManuallyGraded,
        (None, _) => GradingStatus::PendingReview,
    };

    AssessmentAnswer {
        id: Uuid::new_v4().to_string(),
        attempt_id: "attempt-1".to_string(),
        question_id: question.id.clone(),
        answer: Json(payload),
        is_correct: None,
        points_earned,
        grading_status,
        grader_feedback: None,
        graded_by: None,
        graded_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn make_prerequisite(rule: PrerequisiteRule) -> AssessmentPrerequisite {
    AssessmentPrerequisite {
        id: Uuid::new_v4().to_string(),
        assessment_id: "assessment-1".to_string(),
        prerequisite_type: rule.prerequisite_type(),
        prerequisite_data: Json(rule),
        created_at: fixture_now(),
    }
}

pub(crate) fn make_upload_session(total_chunks: i32, received: Vec<i32>) -> UploadSession {
    let now = fixture_now();
    UploadSession {
        id: Uuid::new_v4().to_string(),
        student_id: "student-1".to_string(),
        filename: "lecture.mp4".to_string(),
        total_chunks,
        received_chunks: received,
        status: UploadStatus::InProgress,
        finalize_requested: false,
        claimed_at: None,
        error_message: None,
        expires_at: now + time::Duration::hours(24),
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn make_quality(
    tier: QualityTier,
    status: QualityStatus,
    processing_progress: i32,
) -> VideoQuality {
    let now = fixture_now();
    VideoQuality {
        id: Uuid::new_v4().to_string(),
        video_id: "video-1".to_string(),
        tier,
        status,
        processing_progress,
        output_path: None,
        file_size: None,
        error_message: None,
        attempt_count: 1,
        claimed_at: None,
        created_at: now,
        updated_at: now,
    }
}
