use thiserror::Error;

use crate::db::models::{AnswerPayload, AssessmentQuestion, QuestionPayload};
use crate::db::types::QuestionType;

#[derive(Debug, Error)]
pub(crate) enum AutoGradeError {
    #[error("answer payload does not match question type {0:?}")]
    PayloadMismatch(QuestionType),
    #[error("submitted option '{0}' is not one of the question's options")]
    UnknownOption(String),
}

/// Outcome of auto-grading one answer. Points are all-or-nothing: the full
/// question value for a correct answer, zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AutoGrade {
    pub(crate) is_correct: bool,
    pub(crate) points_earned: f64,
}

/// Grade an auto-gradable answer. Short-answer and essay questions are never
/// passed here; they go straight to the manual review queue.
pub(crate) fn grade(
    question: &AssessmentQuestion,
    answer: &AnswerPayload,
) -> Result<AutoGrade, AutoGradeError> {
    match (&question.payload.0, answer) {
        (
            QuestionPayload::MultipleChoice { options, correct_option_id },
            AnswerPayload::Choice { option_id },
        ) => {
            if !options.iter().any(|option| option.id == *option_id) {
                return Err(AutoGradeError::UnknownOption(option_id.clone()));
            }
            Ok(scored(option_id == correct_option_id, question.points))
        }
        (QuestionPayload::TrueFalse { correct_answer }, AnswerPayload::Boolean { value }) => {
            Ok(scored(value == correct_answer, question.points))
        }
        _ => Err(AutoGradeError::PayloadMismatch(question.question_type)),
    }
}

fn scored(is_correct: bool, points: f64) -> AutoGrade {
    AutoGrade { is_correct, points_earned: if is_correct { points } else { 0.0 } }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::QuestionOption;
    use crate::test_support::{make_question, mc_payload};

    #[test]
    fn correct_choice_earns_full_points() {
        let question = make_question(QuestionType::MultipleChoice, 5.0, mc_payload("a"));
        let graded =
            grade(&question, &AnswerPayload::Choice { option_id: "a".to_string() }).expect("grade");
        assert!(graded.is_correct);
        assert_eq!(graded.points_earned, 5.0);
    }

    #[test]
    fn wrong_choice_earns_zero() {
        let question = make_question(QuestionType::MultipleChoice, 5.0, mc_payload("a"));
        let graded =
            grade(&question, &AnswerPayload::Choice { option_id: "b".to_string() }).expect("grade");
        assert!(!graded.is_correct);
        assert_eq!(graded.points_earned, 0.0);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let question = make_question(QuestionType::MultipleChoice, 5.0, mc_payload("a"));
        let result = grade(&question, &AnswerPayload::Choice { option_id: "zz".to_string() });
        assert!(matches!(result, Err(AutoGradeError::UnknownOption(_))));
    }

    #[test]
    fn true_false_compares_booleans() {
        let question = make_question(
            QuestionType::TrueFalse,
            2.0,
            QuestionPayload::TrueFalse { correct_answer: true },
        );
        let right = grade(&question, &AnswerPayload::Boolean { value: true }).expect("grade");
        assert!(right.is_correct);
        assert_eq!(right.points_earned, 2.0);

        let wrong = grade(&question, &AnswerPayload::Boolean { value: false }).expect("grade");
        assert!(!wrong.is_correct);
        assert_eq!(wrong.points_earned, 0.0);
    }

    #[test]
    fn mismatched_payload_kind_is_rejected() {
        let question = make_question(
            QuestionType::TrueFalse,
            2.0,
            QuestionPayload::TrueFalse { correct_answer: true },
        );
        let result = grade(&question, &AnswerPayload::Text { text: "true".to_string() });
        assert!(matches!(result, Err(AutoGradeError::PayloadMismatch(QuestionType::TrueFalse))));
    }

    #[test]
    fn essay_payload_is_never_auto_gradable() {
        let question = make_question(
            QuestionType::Essay,
            10.0,
            QuestionPayload::Essay { grading_rubric: None },
        );
        let result = grade(&question, &AnswerPayload::Text { text: "…".to_string() });
        assert!(matches!(result, Err(AutoGradeError::PayloadMismatch(QuestionType::Essay))));
    }

    #[test]
    fn options_with_duplicate_text_still_grade_by_id() {
        let payload = QuestionPayload::MultipleChoice {
            options: vec![
                QuestionOption { id: "a".to_string(), text: "42".to_string() },
                QuestionOption { id: "b".to_string(), text: "42".to_string() },
            ],
            correct_option_id: "b".to_string(),
        };
        let question = make_question(QuestionType::MultipleChoice, 1.0, payload);
        let graded =
            grade(&question, &AnswerPayload::Choice { option_id: "a".to_string() }).expect("grade");
        assert!(!graded.is_correct);
    }
}
