use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{
    Assessment, AssessmentQuestion, PrerequisiteRule, QuestionOption, QuestionPayload,
};
use crate::db::types::QuestionType;
use crate::repositories::stats::{AssessmentStats, QuestionStats};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AssessmentCreate {
    pub(crate) course_id: String,
    #[validate(length(min = 1, max = 255))]
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub(crate) time_limit_minutes: i32,
    #[validate(range(min = 0.0, max = 100.0))]
    pub(crate) passing_score: f64,
    #[validate(range(min = 1))]
    pub(crate) max_attempts: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_option_offset_datetime")]
    pub(crate) start_date: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "deserialize_option_offset_datetime")]
    pub(crate) end_date: Option<OffsetDateTime>,
    #[serde(default = "default_true")]
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) questions: Vec<QuestionCreate>,
    #[serde(default)]
    pub(crate) prerequisites: Vec<PrerequisiteCreate>,
}

fn default_true() -> bool {
    true
}

fn deserialize_option_offset_datetime<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => OffsetDateTime::parse(&value, &Rfc3339)
            .map_err(|_| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionCreate {
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) order_index: i32,
    pub(crate) payload: QuestionPayload,
}

impl QuestionCreate {
    /// Shape checks the `validator` derive cannot express: option-set rules
    /// for multiple choice and the positive-points/ordering invariants.
    pub(crate) fn validate_shape(&self) -> Result<QuestionType, String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if self.points <= 0.0 {
            return Err("points must be positive".to_string());
        }
        if self.order_index < 1 {
            return Err("order must be >= 1".to_string());
        }

        if let QuestionPayload::MultipleChoice { options, correct_option_id } = &self.payload {
            if options.len() < 2 {
                return Err("multiple choice requires at least 2 options".to_string());
            }
            let mut ids = std::collections::HashSet::new();
            for option in options {
                if option.id.trim().is_empty() {
                    return Err("option ids must not be empty".to_string());
                }
                if !ids.insert(option.id.as_str()) {
                    return Err(format!("duplicate option id '{}'", option.id));
                }
            }
            if !ids.contains(correct_option_id.as_str()) {
                return Err(format!(
                    "correct_option_id '{correct_option_id}' is not one of the options"
                ));
            }
        }

        Ok(self.payload.question_type())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrerequisiteCreate {
    pub(crate) rule: PrerequisiteRule,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssessmentResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) time_limit_minutes: i32,
    pub(crate) passing_score: f64,
    pub(crate) max_attempts: Option<i32>,
    pub(crate) start_date: Option<String>,
    pub(crate) end_date: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) questions: Vec<QuestionResponse>,
}

/// Student-facing question view: the answer key stays server-side.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) order_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) options: Option<Vec<QuestionOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) grading_rubric: Option<String>,
}

pub(crate) fn question_to_response(question: AssessmentQuestion) -> QuestionResponse {
    let (options, grading_rubric) = match question.payload.0 {
        QuestionPayload::MultipleChoice { options, .. } => (Some(options), None),
        QuestionPayload::TrueFalse { .. } => (None, None),
        QuestionPayload::ShortAnswer { grading_rubric }
        | QuestionPayload::Essay { grading_rubric } => (None, grading_rubric),
    };

    QuestionResponse {
        id: question.id,
        question_type: question.question_type,
        prompt: question.prompt,
        points: question.points,
        order_index: question.order_index,
        options,
        grading_rubric,
    }
}

pub(crate) fn assessment_to_response(
    assessment: Assessment,
    questions: Vec<AssessmentQuestion>,
) -> AssessmentResponse {
    AssessmentResponse {
        id: assessment.id,
        course_id: assessment.course_id,
        title: assessment.title,
        description: assessment.description,
        time_limit_minutes: assessment.time_limit_minutes,
        passing_score: assessment.passing_score,
        max_attempts: assessment.max_attempts,
        start_date: assessment.start_date.map(format_primitive),
        end_date: assessment.end_date.map(format_primitive),
        is_active: assessment.is_active,
        created_by: assessment.created_by,
        created_at: format_primitive(assessment.created_at),
        questions: questions.into_iter().map(question_to_response).collect(),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AssessmentStatsResponse {
    pub(crate) total_attempts: i64,
    pub(crate) completed_attempts: i64,
    pub(crate) average_percentage: Option<f64>,
    pub(crate) pass_rate: Option<f64>,
    pub(crate) questions: Vec<QuestionStatsResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionStatsResponse {
    pub(crate) question_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) answer_count: i64,
    pub(crate) average_points: Option<f64>,
    pub(crate) correct_rate: Option<f64>,
}

pub(crate) fn stats_to_response(
    stats: AssessmentStats,
    questions: Vec<QuestionStats>,
) -> AssessmentStatsResponse {
    AssessmentStatsResponse {
        total_attempts: stats.total_attempts,
        completed_attempts: stats.completed_attempts,
        average_percentage: stats.average_percentage,
        pass_rate: stats.pass_rate,
        questions: questions
            .into_iter()
            .map(|question| QuestionStatsResponse {
                question_id: question.question_id,
                question_type: question.question_type,
                prompt: question.prompt,
                points: question.points,
                answer_count: question.answer_count,
                average_points: question.average_points,
                correct_rate: question.correct_rate,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::QuestionOption;

    fn mc_question(options: Vec<QuestionOption>, correct: &str) -> QuestionCreate {
        QuestionCreate {
            prompt: "Pick one".to_string(),
            points: 5.0,
            order_index: 1,
            payload: QuestionPayload::MultipleChoice {
                options,
                correct_option_id: correct.to_string(),
            },
        }
    }

    fn opt(id: &str) -> QuestionOption {
        QuestionOption { id: id.to_string(), text: format!("option {id}") }
    }

    #[test]
    fn valid_multiple_choice_passes() {
        let question = mc_question(vec![opt("a"), opt("b")], "a");
        assert_eq!(question.validate_shape(), Ok(QuestionType::MultipleChoice));
    }

    #[test]
    fn single_option_is_rejected() {
        let question = mc_question(vec![opt("a")], "a");
        assert!(question.validate_shape().is_err());
    }

    #[test]
    fn correct_option_must_exist() {
        let question = mc_question(vec![opt("a"), opt("b")], "c");
        assert!(question.validate_shape().is_err());
    }

    #[test]
    fn duplicate_option_ids_are_rejected() {
        let question = mc_question(vec![opt("a"), opt("a")], "a");
        assert!(question.validate_shape().is_err());
    }

    #[test]
    fn non_positive_points_are_rejected() {
        let mut question = mc_question(vec![opt("a"), opt("b")], "a");
        question.points = 0.0;
        assert!(question.validate_shape().is_err());
    }

    #[test]
    fn order_must_start_at_one() {
        let mut question = mc_question(vec![opt("a"), opt("b")], "a");
        question.order_index = 0;
        assert!(question.validate_shape().is_err());
    }
}
