use anyhow::{Context, Result};
use time::Duration;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::services::assembly;
use crate::services::attempt_timing;
use crate::services::media_tools::MediaToolService;

/// Grace added on top of the per-run transcode timeout before a stuck
/// `processing` quality is considered orphaned by a dead worker.
const STALE_TRANSCODE_GRACE_SECONDS: i64 = 300;

/// Passive-expiry sweep: abandoned `in_progress` attempts past their deadline
/// become `timed_out` with no score computed. A concurrent live submission
/// wins the race via the status-guarded update.
pub(crate) async fn close_expired_attempts(state: &AppState) -> Result<()> {
    let now = primitive_now_utc();
    let open = repositories::attempts::list_open_with_time_limit(state.db())
        .await
        .context("Failed to list open attempts")?;

    let mut closed = 0;
    for attempt in open {
        let deadline = attempt_timing::deadline(attempt.start_time, attempt.time_limit_minutes);
        if now <= deadline {
            continue;
        }

        let time_taken_seconds = i64::from(attempt.time_limit_minutes) * 60;
        let transitioned = repositories::attempts::time_out(
            state.db(),
            &attempt.id,
            deadline,
            time_taken_seconds,
            now,
        )
        .await
        .context("Failed to time out attempt")?;

        if transitioned {
            closed += 1;
        }
    }

    if closed > 0 {
        tracing::info!(closed_attempts = closed, "Timed out overdue attempts");
    }
    metrics::counter!("attempts_timed_out_total").increment(closed as u64);

    Ok(())
}

pub(crate) async fn expire_upload_sessions(state: &AppState) -> Result<()> {
    let expired = repositories::upload_sessions::expire_overdue(state.db(), primitive_now_utc())
        .await
        .context("Failed to expire upload sessions")?;

    if expired > 0 {
        tracing::info!(expired_sessions = expired, "Expired overdue upload sessions");
    }
    metrics::counter!("upload_sessions_expired_total").increment(expired);

    Ok(())
}

/// Requeue qualities whose worker died mid-transcode. Crashes do not consume
/// the retry budget; only tool failures do.
pub(crate) async fn recover_stale_transcodes(state: &AppState) -> Result<()> {
    let now = primitive_now_utc();
    let timeout_seconds = state.settings().media().transcode_timeout_seconds as i64;
    let stale_before = now - Duration::seconds(timeout_seconds + STALE_TRANSCODE_GRACE_SECONDS);

    let recovered =
        repositories::videos::recover_stale_processing(state.db(), stale_before, now)
            .await
            .context("Failed to recover stale transcodes")?;

    if recovered > 0 {
        tracing::warn!(recovered_qualities = recovered, "Requeued stale transcode units");
    }
    metrics::counter!("transcodes_stale_recovered_total").increment(recovered);

    Ok(())
}

/// Resume videos whose assembly committed but whose metadata/fan-out phase
/// never ran because the worker crashed in between.
pub(crate) async fn resume_stalled_videos(
    state: &AppState,
    media: &MediaToolService,
) -> Result<()> {
    let stale_before = primitive_now_utc() - Duration::minutes(5);
    let stalled = repositories::videos::list_stalled_pending(state.db(), stale_before)
        .await
        .context("Failed to list stalled videos")?;

    for video in stalled {
        tracing::warn!(video_id = %video.id, "Resuming stalled video pipeline");
        if let Err(err) = assembly::prepare_video_pipeline(state, media, &video, None).await {
            tracing::error!(video_id = %video.id, error = %err, "Failed to resume video pipeline");
        }
    }

    Ok(())
}
