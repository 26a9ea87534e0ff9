use std::collections::HashSet;

use serde::Serialize;
use sqlx::PgPool;

use crate::db::models::{Assessment, AssessmentPrerequisite, PrerequisiteRule};
use crate::db::types::PrerequisiteType;
use crate::repositories;

/// Everything the rules need to evaluate one student against one course,
/// loaded up front so the checks themselves stay pure.
#[derive(Debug, Clone)]
pub(crate) struct PrerequisiteContext {
    pub(crate) progress_percentage: f64,
    pub(crate) passed_all_quizzes: bool,
    pub(crate) completed_lesson_ids: HashSet<String>,
}

/// One unmet prerequisite, surfaced verbatim to the caller so the frontend
/// can tell the student what is missing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct UnmetPrerequisite {
    pub(crate) prerequisite_type: PrerequisiteType,
    pub(crate) detail: String,
}

pub(crate) fn check(
    prerequisites: &[AssessmentPrerequisite],
    ctx: &PrerequisiteContext,
) -> Vec<UnmetPrerequisite> {
    let mut unmet = Vec::new();

    for prerequisite in prerequisites {
        match &prerequisite.prerequisite_data.0 {
            PrerequisiteRule::QuizCompletion => {
                if !ctx.passed_all_quizzes {
                    unmet.push(UnmetPrerequisite {
                        prerequisite_type: PrerequisiteType::QuizCompletion,
                        detail: "all quizzes in this course must be passed".to_string(),
                    });
                }
            }
            PrerequisiteRule::MinimumProgress { minimum_percentage } => {
                if ctx.progress_percentage < *minimum_percentage {
                    unmet.push(UnmetPrerequisite {
                        prerequisite_type: PrerequisiteType::MinimumProgress,
                        detail: format!(
                            "course progress {:.0}% is below the required {:.0}%",
                            ctx.progress_percentage, minimum_percentage
                        ),
                    });
                }
            }
            PrerequisiteRule::LessonCompletion { lesson_ids } => {
                let missing: Vec<&String> = lesson_ids
                    .iter()
                    .filter(|lesson_id| !ctx.completed_lesson_ids.contains(*lesson_id))
                    .collect();
                if !missing.is_empty() {
                    unmet.push(UnmetPrerequisite {
                        prerequisite_type: PrerequisiteType::LessonCompletion,
                        detail: format!(
                            "{} required lesson(s) not completed",
                            missing.len()
                        ),
                    });
                }
            }
        }
    }

    unmet
}

/// Load the evaluation context for a student against the assessment's course.
/// Quiz completion looks at every other assessment of the same course.
pub(crate) async fn load_context(
    pool: &PgPool,
    assessment: &Assessment,
    student_id: &str,
    prerequisites: &[AssessmentPrerequisite],
) -> Result<PrerequisiteContext, sqlx::Error> {
    let progress_percentage =
        repositories::enrollments::progress_percentage(pool, student_id, &assessment.course_id)
            .await?
            .unwrap_or(0.0);

    let needs_quiz_check = prerequisites
        .iter()
        .any(|p| p.prerequisite_type == PrerequisiteType::QuizCompletion);
    let passed_all_quizzes = if needs_quiz_check {
        repositories::enrollments::has_passed_all_quizzes(
            pool,
            student_id,
            &assessment.course_id,
            &assessment.id,
        )
        .await?
    } else {
        true
    };

    let required_lessons: Vec<String> = prerequisites
        .iter()
        .filter_map(|p| match &p.prerequisite_data.0 {
            PrerequisiteRule::LessonCompletion { lesson_ids } => Some(lesson_ids.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    let completed_lesson_ids = if required_lessons.is_empty() {
        HashSet::new()
    } else {
        repositories::enrollments::completed_lessons(pool, student_id, &required_lessons).await?
    };

    Ok(PrerequisiteContext { progress_percentage, passed_all_quizzes, completed_lesson_ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_prerequisite;

    fn ctx(progress: f64, quizzes: bool, lessons: &[&str]) -> PrerequisiteContext {
        PrerequisiteContext {
            progress_percentage: progress,
            passed_all_quizzes: quizzes,
            completed_lesson_ids: lessons.iter().map(|id| id.to_string()).collect(),
        }
    }

    #[test]
    fn all_rules_met_yields_empty_list() {
        let prerequisites = vec![
            make_prerequisite(PrerequisiteRule::QuizCompletion),
            make_prerequisite(PrerequisiteRule::MinimumProgress { minimum_percentage: 50.0 }),
            make_prerequisite(PrerequisiteRule::LessonCompletion {
                lesson_ids: vec!["l1".to_string(), "l2".to_string()],
            }),
        ];
        let unmet = check(&prerequisites, &ctx(75.0, true, &["l1", "l2", "l3"]));
        assert!(unmet.is_empty());
    }

    #[test]
    fn minimum_progress_below_threshold_is_unmet() {
        let prerequisites =
            vec![make_prerequisite(PrerequisiteRule::MinimumProgress { minimum_percentage: 80.0 })];
        let unmet = check(&prerequisites, &ctx(79.9, true, &[]));
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].prerequisite_type, PrerequisiteType::MinimumProgress);
    }

    #[test]
    fn missing_lessons_are_reported() {
        let prerequisites = vec![make_prerequisite(PrerequisiteRule::LessonCompletion {
            lesson_ids: vec!["l1".to_string(), "l2".to_string()],
        })];
        let unmet = check(&prerequisites, &ctx(100.0, true, &["l1"]));
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].prerequisite_type, PrerequisiteType::LessonCompletion);
    }

    #[test]
    fn every_failed_rule_is_listed() {
        let prerequisites = vec![
            make_prerequisite(PrerequisiteRule::QuizCompletion),
            make_prerequisite(PrerequisiteRule::MinimumProgress { minimum_percentage: 50.0 }),
        ];
        let unmet = check(&prerequisites, &ctx(10.0, false, &[]));
        assert_eq!(unmet.len(), 2);
    }
}
