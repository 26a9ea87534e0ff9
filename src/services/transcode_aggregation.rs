use crate::db::models::VideoQuality;
use crate::db::types::{QualityStatus, VideoStatus};

/// What the completion aggregator should do after looking at every sibling
/// quality of one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AggregateDecision {
    /// Every unit is terminal: finalize the video to the given status.
    Finalize(VideoStatus),
    /// Units still running; carry the aggregate progress (0–100).
    InFlight(i32),
}

/// Pure aggregation over all sibling quality rows. A video finalizes only
/// once every quality is terminal, to `completed` when at least one quality
/// made it, `failed` otherwise. Order-independent and idempotent, so any
/// finishing unit may run it.
pub(crate) fn evaluate(qualities: &[VideoQuality]) -> AggregateDecision {
    if qualities.is_empty() {
        return AggregateDecision::InFlight(0);
    }

    let all_terminal = qualities.iter().all(|quality| quality.status.is_terminal());
    if all_terminal {
        let any_completed =
            qualities.iter().any(|quality| quality.status == QualityStatus::Completed);
        let status = if any_completed { VideoStatus::Completed } else { VideoStatus::Failed };
        return AggregateDecision::Finalize(status);
    }

    let total: i64 = qualities.iter().map(|quality| i64::from(quality.processing_progress)).sum();
    let progress = (total / qualities.len() as i64) as i32;
    AggregateDecision::InFlight(progress.clamp(0, 99))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::QualityTier;
    use crate::test_support::make_quality;

    #[test]
    fn empty_set_stays_in_flight() {
        assert_eq!(evaluate(&[]), AggregateDecision::InFlight(0));
    }

    #[test]
    fn no_finalization_while_any_unit_is_running() {
        let qualities = vec![
            make_quality(QualityTier::P360, QualityStatus::Completed, 100),
            make_quality(QualityTier::P480, QualityStatus::Processing, 40),
        ];
        assert_eq!(evaluate(&qualities), AggregateDecision::InFlight(70));
    }

    #[test]
    fn pending_unit_also_blocks_finalization() {
        let qualities = vec![
            make_quality(QualityTier::P360, QualityStatus::Completed, 100),
            make_quality(QualityTier::P480, QualityStatus::Pending, 0),
        ];
        assert!(matches!(evaluate(&qualities), AggregateDecision::InFlight(_)));
    }

    #[test]
    fn partial_success_finalizes_completed() {
        let qualities = vec![
            make_quality(QualityTier::P360, QualityStatus::Completed, 100),
            make_quality(QualityTier::P480, QualityStatus::Completed, 100),
            make_quality(QualityTier::P720, QualityStatus::Completed, 100),
            make_quality(QualityTier::P1080, QualityStatus::Failed, 15),
        ];
        assert_eq!(evaluate(&qualities), AggregateDecision::Finalize(VideoStatus::Completed));
    }

    #[test]
    fn all_failed_finalizes_failed() {
        let qualities = vec![
            make_quality(QualityTier::P360, QualityStatus::Failed, 0),
            make_quality(QualityTier::P480, QualityStatus::Failed, 10),
        ];
        assert_eq!(evaluate(&qualities), AggregateDecision::Finalize(VideoStatus::Failed));
    }

    #[test]
    fn evaluation_is_order_independent() {
        let mut qualities = vec![
            make_quality(QualityTier::P1080, QualityStatus::Failed, 20),
            make_quality(QualityTier::P360, QualityStatus::Completed, 100),
        ];
        let forward = evaluate(&qualities);
        qualities.reverse();
        assert_eq!(forward, evaluate(&qualities));
    }

    #[test]
    fn in_flight_progress_never_reports_100() {
        let qualities = vec![
            make_quality(QualityTier::P360, QualityStatus::Completed, 100),
            make_quality(QualityTier::P480, QualityStatus::Processing, 100),
        ];
        assert_eq!(evaluate(&qualities), AggregateDecision::InFlight(99));
    }
}
