use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::AnswerPayload;
use crate::db::types::QuestionType;
use crate::repositories::answers::PendingAnswerRow;

#[derive(Debug, Deserialize)]
pub(crate) struct GradeAnswerRequest {
    pub(crate) graded_by: String,
    pub(crate) points_earned: f64,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PendingAnswerResponse {
    pub(crate) answer_id: String,
    pub(crate) attempt_id: String,
    pub(crate) assessment_id: String,
    pub(crate) assessment_title: String,
    pub(crate) student_id: String,
    pub(crate) question_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) answer: AnswerPayload,
    pub(crate) submitted_at: Option<String>,
}

pub(crate) fn pending_to_response(row: PendingAnswerRow) -> PendingAnswerResponse {
    PendingAnswerResponse {
        answer_id: row.answer_id,
        attempt_id: row.attempt_id,
        assessment_id: row.assessment_id,
        assessment_title: row.assessment_title,
        student_id: row.student_id,
        question_id: row.question_id,
        question_type: row.question_type,
        prompt: row.prompt,
        points: row.points,
        answer: row.answer.0,
        submitted_at: row.submitted_at.map(format_primitive),
    }
}
