use anyhow::{Context, Result};
use time::Duration;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::services::assembly;
use crate::services::media_tools::MediaToolService;

/// How long a claimed session may sit before another worker may retake it.
const CLAIM_STALE_MINUTES: i64 = 30;

pub(crate) async fn claim_next_session(state: &AppState) -> Result<Option<String>> {
    let now = primitive_now_utc();
    repositories::upload_sessions::claim_next_for_assembly(
        state.db(),
        now - Duration::minutes(CLAIM_STALE_MINUTES),
        now,
    )
    .await
    .context("Failed to claim upload session")
}

pub(crate) async fn process_session(
    state: &AppState,
    media: &MediaToolService,
    session_id: &str,
) -> Result<()> {
    assembly::assemble_session(state, media, session_id).await
}

/// Failure path for the claim loop: the session is failed in place with the
/// error recorded and the chunk objects retained for inspection.
pub(crate) async fn mark_session_failed(state: &AppState, session_id: &str, error: &str) {
    metrics::counter!("uploads_assembly_failed_total").increment(1);
    if let Err(mark_err) = repositories::upload_sessions::mark_failed(
        state.db(),
        session_id,
        error,
        primitive_now_utc(),
    )
    .await
    {
        tracing::error!(
            session_id,
            error = %mark_err,
            "Failed to mark upload session failed after assembly error"
        );
    }
}
