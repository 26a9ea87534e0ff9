use serde::{Deserialize, Serialize};

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{AnswerPayload, AssessmentAnswer, AssessmentAttempt};
use crate::db::types::{AttemptStatus, GradingStatus};

#[derive(Debug, Deserialize)]
pub(crate) struct StartAttemptRequest {
    pub(crate) student_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerInput {
    pub(crate) question_id: String,
    pub(crate) answer: AnswerPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitAttemptRequest {
    pub(crate) student_id: String,
    pub(crate) answers: Vec<AnswerInput>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) assessment_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) start_time: String,
    pub(crate) completion_time: Option<String>,
    pub(crate) time_taken_seconds: Option<i64>,
    pub(crate) score: Option<f64>,
    pub(crate) max_score: Option<f64>,
    pub(crate) percentage: Option<f64>,
    pub(crate) passed: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) answers: Vec<AnswerResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) answer: AnswerPayload,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: Option<f64>,
    pub(crate) grading_status: GradingStatus,
    pub(crate) grader_feedback: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<String>,
}

pub(crate) fn attempt_to_response(
    attempt: AssessmentAttempt,
    answers: Vec<AssessmentAnswer>,
) -> AttemptResponse {
    AttemptResponse {
        id: attempt.id,
        assessment_id: attempt.assessment_id,
        student_id: attempt.student_id,
        attempt_number: attempt.attempt_number,
        status: attempt.status,
        start_time: format_primitive(attempt.start_time),
        completion_time: attempt.completion_time.map(format_primitive),
        time_taken_seconds: attempt.time_taken_seconds,
        score: attempt.score,
        max_score: attempt.max_score,
        percentage: attempt.percentage,
        passed: attempt.passed,
        answers: answers.into_iter().map(answer_to_response).collect(),
    }
}

pub(crate) fn answer_to_response(answer: AssessmentAnswer) -> AnswerResponse {
    AnswerResponse {
        id: answer.id,
        question_id: answer.question_id,
        answer: answer.answer.0,
        is_correct: answer.is_correct,
        points_earned: answer.points_earned,
        grading_status: answer.grading_status,
        grader_feedback: answer.grader_feedback,
        graded_by: answer.graded_by,
        graded_at: answer.graded_at.map(format_primitive),
    }
}
