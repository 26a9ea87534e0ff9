use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::UploadSession;
use crate::db::types::UploadStatus;
use crate::services::upload_sessions::{is_complete, missing_chunks};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CreateUploadRequest {
    pub(crate) student_id: String,
    #[validate(length(min = 1, max = 255))]
    pub(crate) filename: String,
    #[validate(range(min = 1))]
    pub(crate) total_chunks: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadSessionResponse {
    pub(crate) session_id: String,
    pub(crate) filename: String,
    pub(crate) total_chunks: i32,
    pub(crate) received_count: i32,
    pub(crate) missing_chunks: Vec<i32>,
    pub(crate) is_complete: bool,
    pub(crate) status: UploadStatus,
    pub(crate) finalize_requested: bool,
    pub(crate) error_message: Option<String>,
    pub(crate) expires_at: String,
}

pub(crate) fn session_to_response(session: UploadSession) -> UploadSessionResponse {
    let complete = is_complete(&session);
    let missing = missing_chunks(&session);
    UploadSessionResponse {
        is_complete: complete,
        missing_chunks: missing,
        received_count: session.received_chunks.len() as i32,
        session_id: session.id,
        filename: session.filename,
        total_chunks: session.total_chunks,
        status: session.status,
        finalize_requested: session.finalize_requested,
        error_message: session.error_message,
        expires_at: format_primitive(session.expires_at),
    }
}
