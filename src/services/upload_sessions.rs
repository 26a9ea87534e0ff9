use thiserror::Error;
use time::Duration;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::UploadSession;
use crate::db::types::UploadStatus;
use crate::repositories;

#[derive(Debug, Error)]
pub(crate) enum UploadError {
    #[error("upload session not found")]
    SessionNotFound,
    #[error("upload session is {0:?} and no longer accepts chunks")]
    SessionClosed(UploadStatus),
    #[error("upload session expired")]
    SessionExpired,
    #[error("chunk number {chunk_number} outside [0, {total_chunks})")]
    InvalidChunk { chunk_number: i32, total_chunks: i32 },
    #[error("chunk exceeds maximum size of {max_mb} MB")]
    ChunkTooLarge { max_mb: u64 },
    #[error("total_chunks must be between 1 and {max}")]
    InvalidTotalChunks { max: u32 },
    #[error("upload incomplete, missing chunks: {missing:?}")]
    Incomplete { missing: Vec<i32> },
    #[error("object storage is not configured")]
    StorageUnavailable,
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Storage key of one chunk; zero-padded so lexicographic listings line up
/// with numeric order.
pub(crate) fn chunk_key(session_id: &str, chunk_number: i32) -> String {
    format!("uploads/{session_id}/chunks/{chunk_number:05}")
}

pub(crate) fn chunk_prefix(session_id: &str) -> String {
    format!("uploads/{session_id}/")
}

/// Completeness predicate: every chunk in `[0, total_chunks)` received.
pub(crate) fn is_complete(session: &UploadSession) -> bool {
    missing_chunks(session).is_empty()
}

pub(crate) fn missing_chunks(session: &UploadSession) -> Vec<i32> {
    let received: std::collections::HashSet<i32> =
        session.received_chunks.iter().copied().collect();
    (0..session.total_chunks).filter(|chunk| !received.contains(chunk)).collect()
}

pub(crate) async fn create_session(
    state: &AppState,
    student_id: &str,
    filename: &str,
    total_chunks: i32,
) -> Result<UploadSession, UploadError> {
    let max = state.settings().upload().max_total_chunks;
    if total_chunks < 1 || total_chunks as i64 > max as i64 {
        return Err(UploadError::InvalidTotalChunks { max });
    }

    let now = primitive_now_utc();
    let ttl = Duration::minutes(state.settings().upload().session_ttl_minutes as i64);
    let session = repositories::upload_sessions::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        student_id,
        filename,
        total_chunks,
        now + ttl,
        now,
    )
    .await?;

    Ok(session)
}

/// Persist one chunk and record it as received. Idempotent: re-receiving a
/// chunk overwrites the stored bytes and leaves the received set unchanged.
pub(crate) async fn receive_chunk(
    state: &AppState,
    session_id: &str,
    chunk_number: i32,
    bytes: Vec<u8>,
) -> Result<UploadSession, UploadError> {
    let session = repositories::upload_sessions::find_by_id(state.db(), session_id)
        .await?
        .ok_or(UploadError::SessionNotFound)?;

    if session.status != UploadStatus::InProgress {
        return Err(UploadError::SessionClosed(session.status));
    }

    let now = primitive_now_utc();
    if now > session.expires_at {
        return Err(UploadError::SessionExpired);
    }

    if chunk_number < 0 || chunk_number >= session.total_chunks {
        return Err(UploadError::InvalidChunk { chunk_number, total_chunks: session.total_chunks });
    }

    let max_mb = state.settings().upload().max_chunk_size_mb;
    if bytes.len() as u64 > max_mb * 1024 * 1024 {
        return Err(UploadError::ChunkTooLarge { max_mb });
    }

    let storage = state.storage().ok_or(UploadError::StorageUnavailable)?;
    storage
        .upload_bytes(&chunk_key(session_id, chunk_number), "application/octet-stream", bytes)
        .await
        .map_err(UploadError::Storage)?;

    metrics::counter!("upload_chunks_received_total").increment(1);

    let updated = match repositories::upload_sessions::add_received_chunk(
        state.db(),
        session_id,
        chunk_number,
        primitive_now_utc(),
    )
    .await
    {
        Ok(value) => value,
        Err(err) => {
            // Chunk bytes without a matching record are unreachable; drop
            // them rather than leave orphans behind.
            let _ = storage.delete_object(&chunk_key(session_id, chunk_number)).await;
            return Err(err.into());
        }
    };

    match updated {
        Some(session) => Ok(session),
        // The guarded update matches only in-progress rows; losing the race
        // to a concurrent failure shows up here as a closed session.
        None => {
            let current = repositories::upload_sessions::find_by_id(state.db(), session_id)
                .await?
                .ok_or(UploadError::SessionNotFound)?;
            Err(UploadError::SessionClosed(current.status))
        }
    }
}

/// Explicit finalize call: re-checks completeness from a fresh read, then
/// queues the session for the assembly worker.
pub(crate) async fn request_assembly(
    state: &AppState,
    session_id: &str,
) -> Result<UploadSession, UploadError> {
    let session = repositories::upload_sessions::find_by_id(state.db(), session_id)
        .await?
        .ok_or(UploadError::SessionNotFound)?;

    if session.status != UploadStatus::InProgress {
        return Err(UploadError::SessionClosed(session.status));
    }

    let missing = missing_chunks(&session);
    if !missing.is_empty() {
        return Err(UploadError::Incomplete { missing });
    }

    repositories::upload_sessions::request_finalize(state.db(), session_id, primitive_now_utc())
        .await?;

    let refreshed = repositories::upload_sessions::find_by_id(state.db(), session_id)
        .await?
        .ok_or(UploadError::SessionNotFound)?;
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_upload_session;

    #[test]
    fn chunk_keys_are_zero_padded() {
        assert_eq!(chunk_key("s1", 0), "uploads/s1/chunks/00000");
        assert_eq!(chunk_key("s1", 42), "uploads/s1/chunks/00042");
        assert!(chunk_key("s1", 9) < chunk_key("s1", 10));
    }

    #[test]
    fn completeness_requires_every_chunk() {
        let mut session = make_upload_session(3, vec![1, 2]);
        assert!(!is_complete(&session));
        assert_eq!(missing_chunks(&session), vec![0]);

        session.received_chunks = vec![0, 1, 2];
        assert!(is_complete(&session));
        assert!(missing_chunks(&session).is_empty());
    }

    #[test]
    fn duplicate_receipts_do_not_fake_completeness() {
        let session = make_upload_session(3, vec![0, 0, 1]);
        assert!(!is_complete(&session));
        assert_eq!(missing_chunks(&session), vec![2]);
    }

    #[test]
    fn empty_session_reports_all_chunks_missing() {
        let session = make_upload_session(4, vec![]);
        assert_eq!(missing_chunks(&session), vec![0, 1, 2, 3]);
    }
}
