pub(crate) mod answers;
pub(crate) mod assessments;
pub(crate) mod attempts;
pub(crate) mod enrollments;
pub(crate) mod stats;
pub(crate) mod upload_sessions;
pub(crate) mod videos;
