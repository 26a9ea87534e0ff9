use time::{Duration, PrimitiveDateTime};

use crate::db::models::{Assessment, AssessmentAttempt};
use crate::db::types::AttemptStatus;

/// Wall-clock deadline of an attempt: `start_time + time_limit`.
pub(crate) fn deadline(
    start_time: PrimitiveDateTime,
    time_limit_minutes: i32,
) -> PrimitiveDateTime {
    start_time + Duration::minutes(time_limit_minutes as i64)
}

/// Predicate used both by the live submission path and the passive expiry
/// sweep: an attempt is expired once it is still open past its deadline.
pub(crate) fn is_expired(
    attempt: &AssessmentAttempt,
    time_limit_minutes: i32,
    now: PrimitiveDateTime,
) -> bool {
    attempt.status == AttemptStatus::InProgress
        && now > deadline(attempt.start_time, time_limit_minutes)
}

/// Whether the assessment accepts new attempts at `now`: it must be active
/// and, when a window is configured, `now` must fall inside it.
pub(crate) fn is_available(assessment: &Assessment, now: PrimitiveDateTime) -> bool {
    if !assessment.is_active {
        return false;
    }
    if let Some(start) = assessment.start_date {
        if now < start {
            return false;
        }
    }
    if let Some(end) = assessment.end_date {
        if now > end {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dt, make_assessment, make_attempt};

    #[test]
    fn deadline_adds_time_limit() {
        let start = dt(2026, 3, 1, 10, 0, 0);
        assert_eq!(deadline(start, 30), dt(2026, 3, 1, 10, 30, 0));
    }

    #[test]
    fn expired_only_past_deadline_and_still_open() {
        let mut attempt = make_attempt("att-1", dt(2026, 3, 1, 10, 0, 0));

        assert!(!is_expired(&attempt, 30, dt(2026, 3, 1, 10, 30, 0)));
        assert!(is_expired(&attempt, 30, dt(2026, 3, 1, 10, 30, 1)));

        attempt.status = AttemptStatus::Completed;
        assert!(!is_expired(&attempt, 30, dt(2026, 3, 1, 11, 0, 0)));
    }

    #[test]
    fn availability_honors_window_and_active_flag() {
        let mut assessment = make_assessment(60, 50.0);
        assessment.start_date = Some(dt(2026, 3, 1, 0, 0, 0));
        assessment.end_date = Some(dt(2026, 3, 31, 23, 59, 59));

        assert!(!is_available(&assessment, dt(2026, 2, 28, 12, 0, 0)));
        assert!(is_available(&assessment, dt(2026, 3, 15, 12, 0, 0)));
        assert!(!is_available(&assessment, dt(2026, 4, 1, 0, 0, 0)));

        assessment.is_active = false;
        assert!(!is_available(&assessment, dt(2026, 3, 15, 12, 0, 0)));
    }

    #[test]
    fn availability_without_window_only_checks_active() {
        let assessment = make_assessment(60, 50.0);
        assert!(is_available(&assessment, dt(2020, 1, 1, 0, 0, 0)));
        assert!(is_available(&assessment, dt(2099, 1, 1, 0, 0, 0)));
    }
}
