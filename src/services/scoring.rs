use crate::db::models::{AssessmentAnswer, AssessmentQuestion};

/// Aggregated scoring state for one attempt. `score`, `percentage` and
/// `passed` stay `None` until every answer carries earned points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScoreSummary {
    pub(crate) score: Option<f64>,
    pub(crate) max_score: f64,
    pub(crate) percentage: Option<f64>,
    pub(crate) passed: Option<bool>,
}

/// Recompute an attempt's score from its answers. Idempotent: safe to call
/// after every single grading change. `max_score` sums every question of the
/// assessment, so unanswered questions cost their full value.
pub(crate) fn recompute(
    questions: &[AssessmentQuestion],
    answers: &[AssessmentAnswer],
    passing_score: f64,
) -> ScoreSummary {
    let max_score: f64 = questions.iter().map(|question| question.points).sum();

    let all_graded = answers.iter().all(|answer| answer.points_earned.is_some());
    if !all_graded {
        return ScoreSummary { score: None, max_score, percentage: None, passed: None };
    }

    let score: f64 = answers.iter().filter_map(|answer| answer.points_earned).sum();
    let percentage = if max_score > 0.0 { score / max_score * 100.0 } else { 0.0 };
    let passed = percentage >= passing_score;

    ScoreSummary { score: Some(score), max_score, percentage: Some(percentage), passed: Some(passed) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::QuestionPayload;
    use crate::db::types::QuestionType;
    use crate::test_support::{make_answer, make_question, mc_payload};

    fn essay() -> AssessmentQuestion {
        make_question(QuestionType::Essay, 10.0, QuestionPayload::Essay { grading_rubric: None })
    }

    #[test]
    fn ungraded_answer_keeps_score_null() {
        let mc = make_question(QuestionType::MultipleChoice, 5.0, mc_payload("a"));
        let essay = essay();
        let questions = vec![mc.clone(), essay.clone()];
        let answers = vec![
            make_answer(&mc, Some(5.0)),
            make_answer(&essay, None),
        ];

        let summary = recompute(&questions, &answers, 60.0);
        assert_eq!(summary.score, None);
        assert_eq!(summary.max_score, 15.0);
        assert_eq!(summary.percentage, None);
        assert_eq!(summary.passed, None);
    }

    #[test]
    fn fully_graded_attempt_computes_percentage_and_pass() {
        let mc1 = make_question(QuestionType::MultipleChoice, 5.0, mc_payload("a"));
        let mc2 = make_question(QuestionType::MultipleChoice, 5.0, mc_payload("a"));
        let essay = essay();
        let questions = vec![mc1.clone(), mc2.clone(), essay.clone()];
        let answers = vec![
            make_answer(&mc1, Some(5.0)),
            make_answer(&mc2, Some(5.0)),
            make_answer(&essay, Some(8.0)),
        ];

        let summary = recompute(&questions, &answers, 90.0);
        assert_eq!(summary.score, Some(18.0));
        assert_eq!(summary.max_score, 20.0);
        assert_eq!(summary.percentage, Some(90.0));
        assert_eq!(summary.passed, Some(true));
    }

    #[test]
    fn failing_below_passing_score() {
        let mc = make_question(QuestionType::MultipleChoice, 10.0, mc_payload("a"));
        let questions = vec![mc.clone()];
        let answers = vec![make_answer(&mc, Some(5.0))];

        let summary = recompute(&questions, &answers, 60.0);
        assert_eq!(summary.percentage, Some(50.0));
        assert_eq!(summary.passed, Some(false));
    }

    #[test]
    fn unanswered_questions_count_against_max_score() {
        let mc1 = make_question(QuestionType::MultipleChoice, 5.0, mc_payload("a"));
        let mc2 = make_question(QuestionType::MultipleChoice, 5.0, mc_payload("a"));
        let questions = vec![mc1.clone(), mc2];
        let answers = vec![make_answer(&mc1, Some(5.0))];

        let summary = recompute(&questions, &answers, 60.0);
        assert_eq!(summary.score, Some(5.0));
        assert_eq!(summary.max_score, 10.0);
        assert_eq!(summary.percentage, Some(50.0));
    }

    #[test]
    fn empty_assessment_scores_zero_percentage() {
        let summary = recompute(&[], &[], 0.0);
        assert_eq!(summary.score, Some(0.0));
        assert_eq!(summary.max_score, 0.0);
        assert_eq!(summary.percentage, Some(0.0));
        assert_eq!(summary.passed, Some(true));
    }

    #[test]
    fn recompute_is_idempotent() {
        let mc = make_question(QuestionType::MultipleChoice, 4.0, mc_payload("a"));
        let questions = vec![mc.clone()];
        let answers = vec![make_answer(&mc, Some(4.0))];

        let first = recompute(&questions, &answers, 50.0);
        let second = recompute(&questions, &answers, 50.0);
        assert_eq!(first, second);
    }
}
