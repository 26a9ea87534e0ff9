use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub(crate) enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    /// Whether answers of this type are scored by the auto-grader at
    /// submission time; the rest wait for a human.
    pub(crate) fn is_auto_gradable(self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Completed,
    TimedOut,
    GradingPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "gradingstatus", rename_all = "snake_case")]
pub(crate) enum GradingStatus {
    AutoGraded,
    ManuallyGraded,
    PendingReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "prerequisitetype", rename_all = "snake_case")]
pub(crate) enum PrerequisiteType {
    QuizCompletion,
    MinimumProgress,
    LessonCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "uploadstatus", rename_all = "snake_case")]
pub(crate) enum UploadStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "videostatus", rename_all = "lowercase")]
pub(crate) enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "qualitystatus", rename_all = "lowercase")]
pub(crate) enum QualityStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QualityStatus {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, QualityStatus::Completed | QualityStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "qualitytier")]
pub(crate) enum QualityTier {
    #[serde(rename = "360p")]
    #[sqlx(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    #[sqlx(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    #[sqlx(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    #[sqlx(rename = "1080p")]
    P1080,
}

impl QualityTier {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            QualityTier::P360 => "360p",
            QualityTier::P480 => "480p",
            QualityTier::P720 => "720p",
            QualityTier::P1080 => "1080p",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "360p" => Some(QualityTier::P360),
            "480p" => Some(QualityTier::P480),
            "720p" => Some(QualityTier::P720),
            "1080p" => Some(QualityTier::P1080),
            _ => None,
        }
    }

    /// Target output height in pixels, used to build the ffmpeg scale filter.
    pub(crate) fn height(self) -> u32 {
        match self {
            QualityTier::P360 => 360,
            QualityTier::P480 => 480,
            QualityTier::P720 => 720,
            QualityTier::P1080 => 1080,
        }
    }

    /// Target video bitrate in kbit/s for this tier.
    pub(crate) fn video_bitrate_kbps(self) -> u32 {
        match self {
            QualityTier::P360 => 800,
            QualityTier::P480 => 1_400,
            QualityTier::P720 => 2_800,
            QualityTier::P1080 => 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::QualityTier;

    #[test]
    fn tier_labels_round_trip() {
        for tier in [QualityTier::P360, QualityTier::P480, QualityTier::P720, QualityTier::P1080] {
            assert_eq!(QualityTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(QualityTier::parse("240p"), None);
    }
}
