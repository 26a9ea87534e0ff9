use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::core::config::Settings;
use crate::db::types::QualityTier;

/// How much of the tool's stderr is kept as the failure diagnostic.
const STDERR_TAIL_BYTES: usize = 4_096;

#[derive(Debug, Error)]
pub(crate) enum MediaToolError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn { tool: &'static str, source: std::io::Error },
    #[error("{tool} exited with {code:?}: {diagnostic}")]
    Failed { tool: &'static str, code: Option<i32>, diagnostic: String },
    #[error("{tool} timed out after {timeout:?}: {diagnostic}")]
    TimedOut { tool: &'static str, timeout: Duration, diagnostic: String },
    #[error("could not parse ffprobe output: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MediaMetadata {
    pub(crate) duration_seconds: f64,
    pub(crate) resolution: Option<String>,
    pub(crate) codec: Option<String>,
    pub(crate) format: Option<String>,
}

/// Subprocess adapter over ffmpeg/ffprobe. Failures capture the tool's
/// stderr tail so the diagnostic lands on the owning row.
#[derive(Debug, Clone)]
pub(crate) struct MediaToolService {
    ffmpeg: String,
    ffprobe: String,
    thumbnail_at_seconds: f64,
}

impl MediaToolService {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            ffmpeg: settings.media().ffmpeg_path.clone(),
            ffprobe: settings.media().ffprobe_path.clone(),
            thumbnail_at_seconds: settings.media().thumbnail_at_seconds,
        }
    }

    pub(crate) async fn extract_metadata(
        &self,
        input: &Path,
    ) -> Result<MediaMetadata, MediaToolError> {
        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaToolError::Spawn { tool: "ffprobe", source })?;

        if !output.status.success() {
            return Err(MediaToolError::Failed {
                tool: "ffprobe",
                code: output.status.code(),
                diagnostic: stderr_tail(&output.stderr),
            });
        }

        parse_metadata(&output.stdout)
    }

    /// Transcode `input` into one quality tier. Progress percentages are sent
    /// over `progress` as ffmpeg reports time advanced; the channel closing is
    /// not an error. The child is killed when `timeout` elapses.
    pub(crate) async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        tier: QualityTier,
        duration_seconds: f64,
        progress: mpsc::UnboundedSender<i32>,
        timeout: Duration,
    ) -> Result<(), MediaToolError> {
        let scale = format!("scale=-2:{}", tier.height());
        let bitrate = format!("{}k", tier.video_bitrate_kbps());

        let mut child = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-vf")
            .arg(&scale)
            .arg("-c:v")
            .arg("libx264")
            .arg("-preset")
            .arg("medium")
            .arg("-b:v")
            .arg(&bitrate)
            .arg("-c:a")
            .arg("aac")
            .arg("-movflags")
            .arg("+faststart")
            .arg("-progress")
            .arg("pipe:1")
            .arg("-nostats")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MediaToolError::Spawn { tool: "ffmpeg", source })?;

        let stdout = child.stdout.take().expect("piped stdout");
        let mut stderr = child.stderr.take().expect("piped stderr");

        let progress_reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut last_sent = -1;
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(out_time_ms) = parse_progress_line(&line) {
                    let percent = progress_percent(out_time_ms, duration_seconds);
                    if percent > last_sent {
                        last_sent = percent;
                        let _ = progress.send(percent);
                    }
                }
            }
        });

        let stderr_reader = tokio::spawn(async move {
            let mut buffer = Vec::new();
            let _ = stderr.read_to_end(&mut buffer).await;
            buffer
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                let diagnostic = stderr_tail(&stderr_reader.await.unwrap_or_default());
                let _ = progress_reader.await;
                return Err(MediaToolError::TimedOut { tool: "ffmpeg", timeout, diagnostic });
            }
        };

        let stderr_bytes = stderr_reader.await.unwrap_or_default();
        let _ = progress_reader.await;

        if !status.success() {
            return Err(MediaToolError::Failed {
                tool: "ffmpeg",
                code: status.code(),
                diagnostic: stderr_tail(&stderr_bytes),
            });
        }

        Ok(())
    }

    pub(crate) async fn generate_thumbnail(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<(), MediaToolError> {
        let at = format!("{:.3}", self.thumbnail_at_seconds);
        let result = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-ss")
            .arg(&at)
            .arg("-i")
            .arg(input)
            .arg("-frames:v")
            .arg("1")
            .arg("-vf")
            .arg("scale=640:-2")
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaToolError::Spawn { tool: "ffmpeg", source })?;

        if !result.status.success() {
            return Err(MediaToolError::Failed {
                tool: "ffmpeg",
                code: result.status.code(),
                diagnostic: stderr_tail(&result.stderr),
            });
        }

        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let start = trimmed.len() - STDERR_TAIL_BYTES;
    // Stay on a char boundary when the tail cuts into multi-byte output.
    let start = (start..trimmed.len()).find(|idx| trimmed.is_char_boundary(*idx)).unwrap_or(start);
    trimmed[start..].to_string()
}

/// Extract `out_time_ms` from one `-progress pipe:1` key=value line.
fn parse_progress_line(line: &str) -> Option<i64> {
    let value = line.strip_prefix("out_time_ms=")?.trim();
    value.parse::<i64>().ok()
}

fn progress_percent(out_time_ms: i64, duration_seconds: f64) -> i32 {
    if duration_seconds <= 0.0 {
        return 0;
    }
    // ffmpeg's out_time_ms is in microseconds despite the name.
    let elapsed_seconds = out_time_ms as f64 / 1_000_000.0;
    ((elapsed_seconds / duration_seconds) * 100.0).clamp(0.0, 100.0) as i32
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
}

fn parse_metadata(stdout: &[u8]) -> Result<MediaMetadata, MediaToolError> {
    let parsed: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|err| MediaToolError::Parse(err.to_string()))?;

    let duration_seconds = parsed
        .format
        .as_ref()
        .and_then(|format| format.duration.as_deref())
        .and_then(|raw| raw.parse::<f64>().ok())
        .ok_or_else(|| MediaToolError::Parse("missing format.duration".to_string()))?;

    let video_stream = parsed
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"));

    let resolution = video_stream.and_then(|stream| match (stream.width, stream.height) {
        (Some(width), Some(height)) => Some(format!("{width}x{height}")),
        _ => None,
    });
    let codec = video_stream.and_then(|stream| stream.codec_name.clone());
    let format = parsed.format.and_then(|format| format.format_name);

    Ok(MediaMetadata { duration_seconds, resolution, codec, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FFPROBE: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
            {"codec_type": "audio", "codec_name": "aac"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "634.517000"}
    }"#;

    #[test]
    fn parse_metadata_reads_duration_resolution_codec() {
        let metadata = parse_metadata(SAMPLE_FFPROBE.as_bytes()).expect("metadata");
        assert_eq!(metadata.duration_seconds, 634.517);
        assert_eq!(metadata.resolution.as_deref(), Some("1920x1080"));
        assert_eq!(metadata.codec.as_deref(), Some("h264"));
        assert_eq!(metadata.format.as_deref(), Some("mov,mp4,m4a,3gp,3g2,mj2"));
    }

    #[test]
    fn parse_metadata_requires_duration() {
        let raw = r#"{"streams": [], "format": {"format_name": "mp4"}}"#;
        assert!(matches!(parse_metadata(raw.as_bytes()), Err(MediaToolError::Parse(_))));
    }

    #[test]
    fn parse_metadata_tolerates_audio_only_input() {
        let raw = r#"{
            "streams": [{"codec_type": "audio", "codec_name": "mp3"}],
            "format": {"format_name": "mp3", "duration": "12.0"}
        }"#;
        let metadata = parse_metadata(raw.as_bytes()).expect("metadata");
        assert_eq!(metadata.resolution, None);
        assert_eq!(metadata.codec, None);
    }

    #[test]
    fn progress_line_parsing() {
        assert_eq!(parse_progress_line("out_time_ms=1500000"), Some(1_500_000));
        assert_eq!(parse_progress_line("frame=42"), None);
        assert_eq!(parse_progress_line("out_time_ms=N/A"), None);
    }

    #[test]
    fn progress_percent_clamps_to_bounds() {
        assert_eq!(progress_percent(30_000_000, 60.0), 50);
        assert_eq!(progress_percent(90_000_000, 60.0), 100);
        assert_eq!(progress_percent(-5, 60.0), 0);
        assert_eq!(progress_percent(1_000_000, 0.0), 0);
    }
}
