use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::types::QualityStatus;
use crate::repositories;
use crate::schemas::video::{video_to_response, VideoResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:video_id", get(get_video))
}

async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoResponse>, ApiError> {
    let video = repositories::videos::find_by_id(state.db(), &video_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch video"))?
        .ok_or(ApiError::NotFound {
            code: "video_not_found",
            detail: "video not found".to_string(),
        })?;

    let mut qualities = repositories::videos::list_qualities(state.db(), &video_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch video qualities"))?;

    // Live progress read-through: the transcode workers mirror their latest
    // percentage to Redis between the throttled database writes.
    for quality in &mut qualities {
        if quality.status != QualityStatus::Processing {
            continue;
        }
        let key = format!("video:progress:{}:{}", video_id, quality.tier.as_str());
        if let Some(cached) = state.redis().get(&key).await {
            if let Ok(percent) = cached.parse::<i32>() {
                quality.processing_progress = quality.processing_progress.max(percent);
            }
        }
    }

    Ok(Json(video_to_response(video, qualities)))
}
