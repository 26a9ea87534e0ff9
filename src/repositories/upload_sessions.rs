use sqlx::{PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::UploadSession;
use crate::db::types::UploadStatus;

pub(crate) const COLUMNS: &str = "\
    id, student_id, filename, total_chunks, received_chunks, status, finalize_requested, \
    claimed_at, error_message, expires_at, created_at, updated_at";

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    student_id: &str,
    filename: &str,
    total_chunks: i32,
    expires_at: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<UploadSession, sqlx::Error> {
    sqlx::query_as::<_, UploadSession>(&format!(
        "INSERT INTO upload_sessions (
            id, student_id, filename, total_chunks, status, expires_at, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$7)
        RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(student_id)
    .bind(filename)
    .bind(total_chunks)
    .bind(UploadStatus::InProgress)
    .bind(expires_at)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<UploadSession>, sqlx::Error> {
    sqlx::query_as::<_, UploadSession>(&format!(
        "SELECT {COLUMNS} FROM upload_sessions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Record a received chunk with an atomic de-duplicating array union, so
/// re-receiving a chunk or racing receivers never produce duplicates.
pub(crate) async fn add_received_chunk(
    pool: &PgPool,
    id: &str,
    chunk_number: i32,
    now: PrimitiveDateTime,
) -> Result<Option<UploadSession>, sqlx::Error> {
    sqlx::query_as::<_, UploadSession>(&format!(
        "UPDATE upload_sessions
         SET received_chunks = ARRAY(
                 SELECT DISTINCT chunk
                 FROM unnest(array_append(received_chunks, $2)) AS chunk
                 ORDER BY chunk
             ),
             updated_at = $3
         WHERE id = $1 AND status = $4
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(chunk_number)
    .bind(now)
    .bind(UploadStatus::InProgress)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn request_finalize(
    pool: &PgPool,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE upload_sessions
         SET finalize_requested = TRUE, updated_at = $2
         WHERE id = $1 AND status = $3",
    )
    .bind(id)
    .bind(now)
    .bind(UploadStatus::InProgress)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Claim the next session awaiting assembly. `SKIP LOCKED` keeps concurrent
/// workers off the same session; a stale claim is retaken after the cutoff.
pub(crate) async fn claim_next_for_assembly(
    pool: &PgPool,
    stale_before: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "UPDATE upload_sessions
         SET claimed_at = $2, updated_at = $2
         WHERE id = (
             SELECT id FROM upload_sessions
             WHERE status = $3
               AND finalize_requested
               AND (claimed_at IS NULL OR claimed_at < $1)
             ORDER BY created_at
             FOR UPDATE SKIP LOCKED
             LIMIT 1
         )
         RETURNING id",
    )
    .bind(stale_before)
    .bind(now)
    .bind(UploadStatus::InProgress)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn mark_completed<'e, E: PgExecutor<'e>>(
    executor: E,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE upload_sessions SET status = $2, updated_at = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(UploadStatus::Completed)
    .bind(now)
    .execute(executor)
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
        "UPDATE upload_sessions SET status = $2, error_message = $3, updated_at = $4 WHERE id = $1",
    )
    .bind(id)
    .bind(UploadStatus::Failed)
    .bind(error_message)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// TTL sweep: sessions past `expires_at` that never asked for assembly are
/// failed in place; chunk data is retained for inspection.
pub(crate) async fn expire_overdue(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE upload_sessions
         SET status = $2, error_message = 'upload session expired', updated_at = $1
         WHERE status = $3 AND NOT finalize_requested AND expires_at < $1",
    )
    .bind(now)
    .bind(UploadStatus::Failed)
    .bind(UploadStatus::InProgress)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
