use sqlx::{PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::{Video, VideoQuality};
use crate::db::types::{QualityStatus, QualityTier, VideoStatus};
use crate::services::media_tools::MediaMetadata;

pub(crate) const COLUMNS: &str = "\
    id, upload_session_id, title, source_path, file_size, source_hash, duration_seconds, \
    resolution, codec, format, status, processing_progress, thumbnail_path, error_message, \
    created_at, updated_at";

pub(crate) const QUALITY_COLUMNS: &str = "\
    id, video_id, tier, status, processing_progress, output_path, file_size, error_message, \
    attempt_count, claimed_at, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(&format!("SELECT {COLUMNS} FROM videos WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Idempotent creation keyed by the upload session: a crashed-and-retried
/// assembly re-reads the row the first run inserted instead of minting a
/// duplicate video.
pub(crate) async fn create_if_absent<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    upload_session_id: &str,
    title: &str,
    source_path: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO videos (
            id, upload_session_id, title, source_path, status, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$6)
        ON CONFLICT (upload_session_id) DO NOTHING",
    )
    .bind(id)
    .bind(upload_session_id)
    .bind(title)
    .bind(source_path)
    .bind(VideoStatus::Pending)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_session<'e, E: PgExecutor<'e>>(
    executor: E,
    upload_session_id: &str,
) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(&format!(
        "SELECT {COLUMNS} FROM videos WHERE upload_session_id = $1"
    ))
    .bind(upload_session_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn set_source_info<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    file_size: i64,
    source_hash: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE videos SET file_size = $2, source_hash = $3, updated_at = $4 WHERE id = $1",
    )
    .bind(id)
    .bind(file_size)
    .bind(source_hash)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn set_metadata_and_start_processing(
    pool: &PgPool,
    id: &str,
    metadata: &MediaMetadata,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE videos
         SET duration_seconds = $2, resolution = $3, codec = $4, format = $5,
             status = $6, updated_at = $7
         WHERE id = $1",
    )
    .bind(id)
    .bind(metadata.duration_seconds)
    .bind(&metadata.resolution)
    .bind(&metadata.codec)
    .bind(&metadata.format)
    .bind(VideoStatus::Processing)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn mark_failed(
    pool: &PgPool,
    id: &str,
    error_message: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE videos SET status = $2, error_message = $3, updated_at = $4 WHERE id = $1",
    )
    .bind(id)
    .bind(VideoStatus::Failed)
    .bind(error_message)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn set_thumbnail(
    pool: &PgPool,
    id: &str,
    thumbnail_path: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE videos SET thumbnail_path = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(thumbnail_path)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn insert_quality(
    pool: &PgPool,
    id: &str,
    video_id: &str,
    tier: QualityTier,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO video_qualities (id, video_id, tier, status, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$5)
         ON CONFLICT (video_id, tier) DO NOTHING",
    )
    .bind(id)
    .bind(video_id)
    .bind(tier)
    .bind(QualityStatus::Pending)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_qualities<'e, E: PgExecutor<'e>>(
    executor: E,
    video_id: &str,
) -> Result<Vec<VideoQuality>, sqlx::Error> {
    sqlx::query_as::<_, VideoQuality>(&format!(
        "SELECT {QUALITY_COLUMNS} FROM video_qualities WHERE video_id = $1 ORDER BY tier"
    ))
    .bind(video_id)
    .fetch_all(executor)
    .await
}

/// A claimed transcode unit together with the source it reads from.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ClaimedQuality {
    pub(crate) id: String,
    pub(crate) video_id: String,
    pub(crate) tier: QualityTier,
    pub(crate) attempt_count: i32,
    pub(crate) source_path: String,
}

/// Claim the next pending quality and move it to `processing`, bumping the
/// attempt counter. `SKIP LOCKED` fans workers out across distinct rows.
pub(crate) async fn claim_next_pending_quality(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Option<ClaimedQuality>, sqlx::Error> {
    sqlx::query_as::<_, ClaimedQuality>(
        "UPDATE video_qualities vq
         SET status = $2, attempt_count = vq.attempt_count + 1, claimed_at = $1, updated_at = $1
         FROM videos v
         WHERE vq.id = (
             SELECT id FROM video_qualities
             WHERE status = $3
             ORDER BY created_at
             FOR UPDATE SKIP LOCKED
             LIMIT 1
         )
           AND v.id = vq.video_id
         RETURNING vq.id, vq.video_id, vq.tier, vq.attempt_count, v.source_path",
    )
    .bind(now)
    .bind(QualityStatus::Processing)
    .bind(QualityStatus::Pending)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn update_quality_progress(
    pool: &PgPool,
    id: &str,
    progress: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE video_qualities
         SET processing_progress = GREATEST(processing_progress, $2), updated_at = $3
         WHERE id = $1 AND status = $4",
    )
    .bind(id)
    .bind(progress)
    .bind(now)
    .bind(QualityStatus::Processing)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn complete_quality(
    pool: &PgPool,
    id: &str,
    output_path: &str,
    file_size: i64,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE video_qualities
         SET status = $2, processing_progress = 100, output_path = $3, file_size = $4,
             error_message = NULL, updated_at = $5
         WHERE id = $1",
    )
    .bind(id)
    .bind(QualityStatus::Completed)
    .bind(output_path)
    .bind(file_size)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn fail_quality(
    pool: &PgPool,
    id: &str,
    error_message: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE video_qualities
         SET status = $2, error_message = $3, updated_at = $4
         WHERE id = $1",
    )
    .bind(id)
    .bind(QualityStatus::Failed)
    .bind(error_message)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Put a failed run back in the queue for another attempt, keeping the
/// diagnostic from the run that just failed.
pub(crate) async fn requeue_quality(
    pool: &PgPool,
    id: &str,
    error_message: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE video_qualities
         SET status = $2, processing_progress = 0, error_message = $3, claimed_at = NULL,
             updated_at = $4
         WHERE id = $1",
    )
    .bind(id)
    .bind(QualityStatus::Pending)
    .bind(error_message)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Requeue qualities stuck in `processing` whose worker likely died. The
/// attempt counter is rolled back: a crash is not a tool failure.
pub(crate) async fn recover_stale_processing(
    pool: &PgPool,
    stale_before: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE video_qualities
         SET status = $2, processing_progress = 0, claimed_at = NULL,
             attempt_count = GREATEST(attempt_count - 1, 0), updated_at = $3
         WHERE status = $4 AND claimed_at IS NOT NULL AND claimed_at < $1",
    )
    .bind(stale_before)
    .bind(QualityStatus::Pending)
    .bind(now)
    .bind(QualityStatus::Processing)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Videos whose assembly committed but whose pipeline setup never ran (crash
/// between the session commit and the metadata/fan-out phase).
pub(crate) async fn list_stalled_pending(
    pool: &PgPool,
    stale_before: PrimitiveDateTime,
) -> Result<Vec<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(&format!(
        "SELECT {COLUMNS} FROM videos v
         WHERE v.status = $1
           AND v.updated_at < $2
           AND EXISTS (
               SELECT 1 FROM upload_sessions s
               WHERE s.id = v.upload_session_id AND s.status = $3
           )"
    ))
    .bind(VideoStatus::Pending)
    .bind(stale_before)
    .bind(crate::db::types::UploadStatus::Completed)
    .fetch_all(pool)
    .await
}

/// Re-evaluate a video after one of its qualities reached a terminal state.
/// The video row is locked for the read-modify-write across its siblings, so
/// concurrent finishers serialize: whichever commits last sees every sibling
/// terminal and performs the finalization, earlier ones update progress only.
pub(crate) async fn finalize_if_terminal(
    pool: &PgPool,
    video_id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<VideoStatus>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let video = sqlx::query_as::<_, Video>(&format!(
        "SELECT {COLUMNS} FROM videos WHERE id = $1 FOR UPDATE"
    ))
    .bind(video_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(video) = video else {
        tx.rollback().await?;
        return Ok(None);
    };

    if video.status.is_terminal() {
        tx.rollback().await?;
        return Ok(None);
    }

    let qualities = list_qualities(&mut *tx, video_id).await?;
    let decision = crate::services::transcode_aggregation::evaluate(&qualities);

    match decision {
        crate::services::transcode_aggregation::AggregateDecision::Finalize(status) => {
            sqlx::query(
                "UPDATE videos SET status = $2, processing_progress = 100, updated_at = $3
                 WHERE id = $1",
            )
            .bind(video_id)
            .bind(status)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(Some(status))
        }
        crate::services::transcode_aggregation::AggregateDecision::InFlight(progress) => {
            sqlx::query(
                "UPDATE videos SET processing_progress = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(video_id)
            .bind(progress)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(None)
        }
    }
}
