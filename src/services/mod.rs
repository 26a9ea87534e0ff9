pub(crate) mod assembly;
pub(crate) mod attempt_flow;
pub(crate) mod attempt_timing;
pub(crate) mod auto_grading;
pub(crate) mod manual_grading;
pub(crate) mod media_tools;
pub(crate) mod prerequisites;
pub(crate) mod scoring;
pub(crate) mod storage;
pub(crate) mod transcode_aggregation;
pub(crate) mod upload_sessions;
