use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::VideoStatus;
use crate::repositories;
use crate::repositories::videos::ClaimedQuality;
use crate::services::media_tools::MediaToolService;

/// Progress writes are throttled to every few percent; the latest value is
/// mirrored to Redis for cheap read-through on the video endpoint.
const PROGRESS_DB_STEP: i32 = 5;
const PROGRESS_CACHE_TTL_SECONDS: u64 = 120;

pub(crate) async fn claim_next_quality(state: &AppState) -> Result<Option<ClaimedQuality>> {
    repositories::videos::claim_next_pending_quality(state.db(), primitive_now_utc())
        .await
        .context("Failed to claim transcode unit")
}

/// Run one claimed per-quality transcode unit to a terminal or requeued
/// state. Sibling units run in parallel; a failure here never touches them.
pub(crate) async fn process_quality(
    state: &AppState,
    media: &MediaToolService,
    claimed: ClaimedQuality,
) -> Result<()> {
    let storage =
        state.storage().ok_or_else(|| anyhow!("Object storage not configured"))?.clone();

    let video = repositories::videos::find_by_id(state.db(), &claimed.video_id)
        .await
        .context("Failed to fetch video")?
        .ok_or_else(|| anyhow!("Video not found for quality"))?;
    let duration_seconds = video.duration_seconds.unwrap_or(0.0);

    let scratch_dir = PathBuf::from(&state.settings().media().scratch_dir);
    tokio::fs::create_dir_all(&scratch_dir).await.context("Failed to create scratch dir")?;

    let input_path = scratch_dir.join(format!("transcode-in-{}.bin", claimed.id));
    let output_path = scratch_dir.join(format!("transcode-out-{}.mp4", claimed.id));

    let bytes = storage
        .get_object(&claimed.source_path)
        .await
        .context("Failed to download transcode source")?;
    tokio::fs::write(&input_path, &bytes).await.context("Failed to write transcode input")?;
    drop(bytes);

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let progress_task = tokio::spawn(drain_progress(
        state.clone(),
        claimed.id.clone(),
        claimed.video_id.clone(),
        claimed.tier.as_str(),
        progress_rx,
    ));

    let timeout = Duration::from_secs(state.settings().media().transcode_timeout_seconds);
    let started = std::time::Instant::now();
    let result = media
        .transcode(&input_path, &output_path, claimed.tier, duration_seconds, progress_tx, timeout)
        .await;

    let _ = progress_task.await;
    let _ = tokio::fs::remove_file(&input_path).await;

    let now = primitive_now_utc();
    let terminal = match result {
        Ok(()) => {
            let output_key =
                format!("videos/{}/{}.mp4", claimed.video_id, claimed.tier.as_str());
            let file_size = storage
                .upload_file(&output_key, "video/mp4", &output_path)
                .await
                .context("Failed to upload transcoded output")?;

            repositories::videos::complete_quality(
                state.db(),
                &claimed.id,
                &output_key,
                file_size,
                now,
            )
            .await
            .context("Failed to mark quality completed")?;

            metrics::counter!("transcodes_total", "status" => "success").increment(1);
            metrics::histogram!("transcode_duration_seconds")
                .record(started.elapsed().as_secs_f64());
            tracing::info!(
                quality_id = %claimed.id,
                video_id = %claimed.video_id,
                tier = claimed.tier.as_str(),
                "Transcode completed"
            );
            true
        }
        Err(err) => {
            let diagnostic = err.to_string();
            let max_attempts = state.settings().media().max_transcode_attempts as i32;

            if claimed.attempt_count >= max_attempts {
                repositories::videos::fail_quality(state.db(), &claimed.id, &diagnostic, now)
                    .await
                    .context("Failed to mark quality failed")?;
                metrics::counter!("transcodes_total", "status" => "failed").increment(1);
                tracing::error!(
                    quality_id = %claimed.id,
                    video_id = %claimed.video_id,
                    tier = claimed.tier.as_str(),
                    attempts = claimed.attempt_count,
                    error = %diagnostic,
                    "Transcode failed after exhausting retries"
                );
                true
            } else {
                repositories::videos::requeue_quality(state.db(), &claimed.id, &diagnostic, now)
                    .await
                    .context("Failed to requeue quality")?;
                metrics::counter!("transcodes_total", "status" => "retried").increment(1);
                tracing::warn!(
                    quality_id = %claimed.id,
                    video_id = %claimed.video_id,
                    tier = claimed.tier.as_str(),
                    attempts = claimed.attempt_count,
                    error = %diagnostic,
                    "Transcode failed, retrying"
                );
                false
            }
        }
    };

    let _ = tokio::fs::remove_file(&output_path).await;

    // Completion aggregation runs after every terminal transition; the last
    // finisher observes all siblings terminal and performs the finalization.
    if terminal {
        let finalized =
            repositories::videos::finalize_if_terminal(state.db(), &claimed.video_id, now)
                .await
                .context("Failed to evaluate video finalization")?;
        if let Some(status) = finalized {
            let label = match status {
                VideoStatus::Completed => "completed",
                _ => "failed",
            };
            metrics::counter!("videos_finalized_total", "status" => label).increment(1);
            tracing::info!(video_id = %claimed.video_id, status = ?status, "Video finalized");
        }
    }

    Ok(())
}

async fn drain_progress(
    state: AppState,
    quality_id: String,
    video_id: String,
    tier: &'static str,
    mut progress_rx: mpsc::UnboundedReceiver<i32>,
) {
    let mut last_written = -1;
    while let Some(percent) = progress_rx.recv().await {
        state
            .redis()
            .set_ex(
                &format!("video:progress:{video_id}:{tier}"),
                &percent.to_string(),
                PROGRESS_CACHE_TTL_SECONDS,
            )
            .await;

        if percent < 100 && percent - last_written < PROGRESS_DB_STEP {
            continue;
        }
        last_written = percent;

        if let Err(err) = repositories::videos::update_quality_progress(
            state.db(),
            &quality_id,
            percent,
            primitive_now_utc(),
        )
        .await
        {
            tracing::debug!(quality_id = %quality_id, error = %err, "Failed to persist progress");
        }
    }
}
