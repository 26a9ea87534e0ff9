use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AttemptStatus, GradingStatus, PrerequisiteType, QualityStatus, QualityTier, QuestionType,
    UploadStatus, VideoStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Assessment {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) time_limit_minutes: i32,
    pub(crate) passing_score: f64,
    pub(crate) max_attempts: Option<i32>,
    pub(crate) start_date: Option<PrimitiveDateTime>,
    pub(crate) end_date: Option<PrimitiveDateTime>,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One selectable option of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) text: String,
}

/// Type-specific question payload, stored as JSONB and decoded at the row
/// boundary. Multiple choice carries a single `correct_option_id`; per-option
/// correctness flags are not a representation this schema admits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum QuestionPayload {
    MultipleChoice { options: Vec<QuestionOption>, correct_option_id: String },
    TrueFalse { correct_answer: bool },
    ShortAnswer { grading_rubric: Option<String> },
    Essay { grading_rubric: Option<String> },
}

impl QuestionPayload {
    pub(crate) fn question_type(&self) -> QuestionType {
        match self {
            QuestionPayload::MultipleChoice { .. } => QuestionType::MultipleChoice,
            QuestionPayload::TrueFalse { .. } => QuestionType::TrueFalse,
            QuestionPayload::ShortAnswer { .. } => QuestionType::ShortAnswer,
            QuestionPayload::Essay { .. } => QuestionType::Essay,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AssessmentQuestion {
    pub(crate) id: String,
    pub(crate) assessment_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) order_index: i32,
    pub(crate) payload: Json<QuestionPayload>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Type-specific prerequisite payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum PrerequisiteRule {
    QuizCompletion,
    MinimumProgress { minimum_percentage: f64 },
    LessonCompletion { lesson_ids: Vec<String> },
}

impl PrerequisiteRule {
    pub(crate) fn prerequisite_type(&self) -> PrerequisiteType {
        match self {
            PrerequisiteRule::QuizCompletion => PrerequisiteType::QuizCompletion,
            PrerequisiteRule::MinimumProgress { .. } => PrerequisiteType::MinimumProgress,
            PrerequisiteRule::LessonCompletion { .. } => PrerequisiteType::LessonCompletion,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AssessmentPrerequisite {
    pub(crate) id: String,
    pub(crate) assessment_id: String,
    pub(crate) prerequisite_type: PrerequisiteType,
    pub(crate) prerequisite_data: Json<PrerequisiteRule>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AssessmentAttempt {
    pub(crate) id: String,
    pub(crate) assessment_id: String,
    pub(crate) student_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) completion_time: Option<PrimitiveDateTime>,
    pub(crate) time_taken_seconds: Option<i64>,
    pub(crate) score: Option<f64>,
    pub(crate) max_score: Option<f64>,
    pub(crate) percentage: Option<f64>,
    pub(crate) passed: Option<bool>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Submitted answer payload, shaped by the question type it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum AnswerPayload {
    Choice { option_id: String },
    Boolean { value: bool },
    Text { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AssessmentAnswer {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) answer: Json<AnswerPayload>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: Option<f64>,
    pub(crate) grading_status: GradingStatus,
    pub(crate) grader_feedback: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct UploadSession {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) filename: String,
    pub(crate) total_chunks: i32,
    pub(crate) received_chunks: Vec<i32>,
    pub(crate) status: UploadStatus,
    pub(crate) finalize_requested: bool,
    pub(crate) claimed_at: Option<PrimitiveDateTime>,
    pub(crate) error_message: Option<String>,
    pub(crate) expires_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Video {
    pub(crate) id: String,
    pub(crate) upload_session_id: String,
    pub(crate) title: String,
    pub(crate) source_path: String,
    pub(crate) file_size: Option<i64>,
    pub(crate) source_hash: Option<String>,
    pub(crate) duration_seconds: Option<f64>,
    pub(crate) resolution: Option<String>,
    pub(crate) codec: Option<String>,
    pub(crate) format: Option<String>,
    pub(crate) status: VideoStatus,
    pub(crate) processing_progress: i32,
    pub(crate) thumbnail_path: Option<String>,
    pub(crate) error_message: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct VideoQuality {
    pub(crate) id: String,
    pub(crate) video_id: String,
    pub(crate) tier: QualityTier,
    pub(crate) status: QualityStatus,
    pub(crate) processing_progress: i32,
    pub(crate) output_path: Option<String>,
    pub(crate) file_size: Option<i64>,
    pub(crate) error_message: Option<String>,
    pub(crate) attempt_count: i32,
    pub(crate) claimed_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_payload_decodes_tagged_variants() {
        let raw = serde_json::json!({
            "kind": "multiple_choice",
            "options": [
                {"id": "a", "text": "Paris"},
                {"id": "b", "text": "Lyon"}
            ],
            "correct_option_id": "a"
        });
        let payload: QuestionPayload = serde_json::from_value(raw).expect("decode");
        assert_eq!(payload.question_type(), QuestionType::MultipleChoice);

        let raw = serde_json::json!({"kind": "true_false", "correct_answer": false});
        let payload: QuestionPayload = serde_json::from_value(raw).expect("decode");
        assert_eq!(payload, QuestionPayload::TrueFalse { correct_answer: false });
    }

    #[test]
    fn question_payload_rejects_unknown_kind() {
        let raw = serde_json::json!({"kind": "matching", "pairs": []});
        assert!(serde_json::from_value::<QuestionPayload>(raw).is_err());
    }

    #[test]
    fn answer_payload_round_trips() {
        let payload = AnswerPayload::Choice { option_id: "b".to_string() };
        let encoded = serde_json::to_value(&payload).expect("encode");
        assert_eq!(encoded["kind"], "choice");
        let decoded: AnswerPayload = serde_json::from_value(encoded).expect("decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn prerequisite_rule_maps_to_type() {
        let rule = PrerequisiteRule::MinimumProgress { minimum_percentage: 75.0 };
        assert_eq!(rule.prerequisite_type(), PrerequisiteType::MinimumProgress);
        let rule = PrerequisiteRule::LessonCompletion { lesson_ids: vec!["l1".into()] };
        assert_eq!(rule.prerequisite_type(), PrerequisiteType::LessonCompletion);
    }
}
