use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Video;
use crate::db::types::{QualityTier, UploadStatus};
use crate::repositories;
use crate::services::media_tools::MediaToolService;
use crate::services::upload_sessions::{chunk_key, chunk_prefix, missing_chunks};

/// Assemble a completed upload session into a video and fan out the
/// transcode units. Restartable from any crash point before the commit in
/// `commit_assembly`; the video row keyed by the session id makes a retry
/// reuse the first run's work instead of duplicating it.
pub(crate) async fn assemble_session(
    state: &AppState,
    media: &MediaToolService,
    session_id: &str,
) -> Result<()> {
    let session = repositories::upload_sessions::find_by_id(state.db(), session_id)
        .await
        .context("Failed to fetch upload session")?
        .ok_or_else(|| anyhow!("Upload session not found"))?;

    if session.status != UploadStatus::InProgress {
        tracing::info!(session_id, status = ?session.status, "Skipping assembly");
        return Ok(());
    }

    // Defensive re-check: the finalize request may have been evaluated from a
    // stale read.
    let missing = missing_chunks(&session);
    if !missing.is_empty() {
        bail!("upload incomplete, missing chunks: {missing:?}");
    }

    let storage =
        state.storage().ok_or_else(|| anyhow!("Object storage not configured"))?.clone();

    let scratch_dir = PathBuf::from(&state.settings().media().scratch_dir);
    tokio::fs::create_dir_all(&scratch_dir).await.context("Failed to create scratch dir")?;
    let scratch_path = scratch_dir.join(format!("assembly-{session_id}.bin"));

    // Concatenate strictly in ascending chunk order; arrival and storage
    // order carry no meaning.
    let mut file = tokio::fs::File::create(&scratch_path)
        .await
        .context("Failed to create scratch file")?;
    let mut hasher = Sha256::new();
    let mut total_size: i64 = 0;

    for chunk_number in 0..session.total_chunks {
        let bytes = storage
            .get_object(&chunk_key(session_id, chunk_number))
            .await
            .with_context(|| format!("Failed to fetch chunk {chunk_number}"))?;
        hasher.update(&bytes);
        total_size += bytes.len() as i64;
        file.write_all(&bytes).await.context("Failed to write scratch file")?;
    }
    file.flush().await.context("Failed to flush scratch file")?;
    drop(file);

    let source_hash = hex::encode(hasher.finalize());

    let now = primitive_now_utc();
    let generated_id = Uuid::new_v4().to_string();
    let extension = source_extension(&session.filename);
    let generated_path = format!("videos/{generated_id}/source.{extension}");

    repositories::videos::create_if_absent(
        state.db(),
        &generated_id,
        session_id,
        title_from_filename(&session.filename),
        &generated_path,
        now,
    )
    .await
    .context("Failed to create video record")?;

    // Re-read the canonical row: a retried assembly reuses the id and path
    // the first run committed.
    let video = repositories::videos::find_by_session(state.db(), session_id)
        .await
        .context("Failed to fetch video record")?
        .ok_or_else(|| anyhow!("Video missing after creation"))?;

    storage
        .upload_file(&video.source_path, "application/octet-stream", &scratch_path)
        .await
        .context("Failed to upload assembled file")?;

    commit_assembly(state, session_id, &video.id, total_size, &source_hash).await?;

    // Chunk scratch data is only dropped once the commit landed; a crash
    // before this point leaves chunks for the retry to re-read.
    if let Err(err) = storage.delete_prefix(&chunk_prefix(session_id)).await {
        tracing::warn!(session_id, error = %err, "Failed to delete chunk objects after assembly");
    }

    metrics::counter!("uploads_assembled_total").increment(1);
    tracing::info!(session_id, video_id = %video.id, size = total_size, "Upload assembled");

    prepare_video_pipeline(state, media, &video, Some(scratch_path)).await
}

async fn commit_assembly(
    state: &AppState,
    session_id: &str,
    video_id: &str,
    total_size: i64,
    source_hash: &str,
) -> Result<()> {
    let now = primitive_now_utc();
    let mut tx = state.db().begin().await.context("Failed to start assembly transaction")?;

    repositories::videos::set_source_info(&mut *tx, video_id, total_size, source_hash, now)
        .await
        .context("Failed to record source info")?;
    repositories::upload_sessions::mark_completed(&mut *tx, session_id, now)
        .await
        .context("Failed to mark session completed")?;

    tx.commit().await.context("Failed to commit assembly")?;
    Ok(())
}

/// Post-commit half of the pipeline: mandatory metadata extraction, quality
/// fan-out, best-effort thumbnail. `local_source` is the still-warm scratch
/// file when called from assembly; a resume re-downloads the source.
pub(crate) async fn prepare_video_pipeline(
    state: &AppState,
    media: &MediaToolService,
    video: &Video,
    local_source: Option<PathBuf>,
) -> Result<()> {
    let storage =
        state.storage().ok_or_else(|| anyhow!("Object storage not configured"))?.clone();

    let scratch_dir = PathBuf::from(&state.settings().media().scratch_dir);
    tokio::fs::create_dir_all(&scratch_dir).await.context("Failed to create scratch dir")?;

    let source_path = match local_source {
        Some(path) => path,
        None => {
            let path = scratch_dir.join(format!("source-{}.bin", video.id));
            let bytes = storage
                .get_object(&video.source_path)
                .await
                .context("Failed to download assembled source")?;
            tokio::fs::write(&path, &bytes).await.context("Failed to write source scratch")?;
            path
        }
    };

    let metadata = match media.extract_metadata(&source_path).await {
        Ok(metadata) => metadata,
        Err(err) => {
            // Metadata is mandatory: without it the transcode tiers cannot
            // report progress, so the video fails here.
            let message = format!("metadata extraction failed: {err}");
            repositories::videos::mark_failed(
                state.db(),
                &video.id,
                &message,
                primitive_now_utc(),
            )
            .await
            .context("Failed to mark video failed")?;
            let _ = tokio::fs::remove_file(&source_path).await;
            metrics::counter!("videos_failed_total", "stage" => "metadata").increment(1);
            return Err(err).context("Metadata extraction failed");
        }
    };

    repositories::videos::set_metadata_and_start_processing(
        state.db(),
        &video.id,
        &metadata,
        primitive_now_utc(),
    )
    .await
    .context("Failed to store video metadata")?;

    for tier_label in &state.settings().media().quality_tiers {
        let Some(tier) = QualityTier::parse(tier_label) else {
            tracing::warn!(tier = %tier_label, "Skipping unknown quality tier");
            continue;
        };
        repositories::videos::insert_quality(
            state.db(),
            &Uuid::new_v4().to_string(),
            &video.id,
            tier,
            primitive_now_utc(),
        )
        .await
        .context("Failed to create quality row")?;
    }

    // The one deliberate error swallow in the pipeline: a video without a
    // thumbnail is acceptable, a video without transcodes is not.
    if let Err(err) = generate_thumbnail(state, media, video, &source_path, &scratch_dir).await {
        tracing::warn!(video_id = %video.id, error = %err, "Thumbnail generation failed");
        metrics::counter!("thumbnails_failed_total").increment(1);
    }

    let _ = tokio::fs::remove_file(&source_path).await;

    tracing::info!(video_id = %video.id, duration = metadata.duration_seconds, "Video ready for transcoding");
    Ok(())
}

async fn generate_thumbnail(
    state: &AppState,
    media: &MediaToolService,
    video: &Video,
    source_path: &Path,
    scratch_dir: &Path,
) -> Result<()> {
    let storage = state.storage().ok_or_else(|| anyhow!("Object storage not configured"))?;

    let local_thumb = scratch_dir.join(format!("thumb-{}.jpg", video.id));
    media.generate_thumbnail(source_path, &local_thumb).await?;

    let key = format!("videos/{}/thumbnail.jpg", video.id);
    storage.upload_file(&key, "image/jpeg", &local_thumb).await?;
    let _ = tokio::fs::remove_file(&local_thumb).await;

    repositories::videos::set_thumbnail(state.db(), &video.id, &key, primitive_now_utc()).await?;
    Ok(())
}

fn source_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()) && !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

fn title_from_filename(filename: &str) -> &str {
    Path::new(filename).file_stem().and_then(|stem| stem.to_str()).unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(source_extension("lecture.mp4"), "mp4");
        assert_eq!(source_extension("lecture.MOV"), "mov");
        assert_eq!(source_extension("no-extension"), "bin");
        assert_eq!(source_extension("weird.ext!"), "bin");
    }

    #[test]
    fn title_strips_extension() {
        assert_eq!(title_from_filename("intro-to-rust.mp4"), "intro-to-rust");
        assert_eq!(title_from_filename("plain"), "plain");
    }
}
