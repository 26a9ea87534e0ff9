use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::{Video, VideoQuality};
use crate::db::types::{QualityStatus, QualityTier, VideoStatus};

#[derive(Debug, Serialize)]
pub(crate) struct VideoResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) status: VideoStatus,
    pub(crate) processing_progress: i32,
    pub(crate) duration_seconds: Option<f64>,
    pub(crate) resolution: Option<String>,
    pub(crate) codec: Option<String>,
    pub(crate) format: Option<String>,
    pub(crate) file_size: Option<i64>,
    pub(crate) thumbnail_path: Option<String>,
    pub(crate) error_message: Option<String>,
    pub(crate) created_at: String,
    pub(crate) qualities: Vec<QualityResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QualityResponse {
    pub(crate) tier: QualityTier,
    pub(crate) status: QualityStatus,
    pub(crate) processing_progress: i32,
    pub(crate) output_path: Option<String>,
    pub(crate) file_size: Option<i64>,
    pub(crate) error_message: Option<String>,
    pub(crate) attempt_count: i32,
}

pub(crate) fn video_to_response(video: Video, qualities: Vec<VideoQuality>) -> VideoResponse {
    VideoResponse {
        id: video.id,
        title: video.title,
        status: video.status,
        processing_progress: video.processing_progress,
        duration_seconds: video.duration_seconds,
        resolution: video.resolution,
        codec: video.codec,
        format: video.format,
        file_size: video.file_size,
        thumbnail_path: video.thumbnail_path,
        error_message: video.error_message,
        created_at: format_primitive(video.created_at),
        qualities: qualities.into_iter().map(quality_to_response).collect(),
    }
}

fn quality_to_response(quality: VideoQuality) -> QualityResponse {
    QualityResponse {
        tier: quality.tier,
        status: quality.status,
        processing_progress: quality.processing_progress,
        output_path: quality.output_path,
        file_size: quality.file_size,
        error_message: quality.error_message,
        attempt_count: quality.attempt_count,
    }
}
