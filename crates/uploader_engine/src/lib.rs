//! Uploader engine: archive server client, job polling and effect execution.
mod api;
mod engine;
mod poller;
mod types;

pub use api::{
    ApiSettings, ArchiveApi, JobStatusSource, NoProgress, ReqwestArchiveApi, UploadProgress,
};
pub use engine::EngineHandle;
pub use poller::{status_stream, JobStatusPoller, PollHandle, PollSettings, StatusSnapshot};
pub use types::{
    ApiError, EngineError, EngineEvent, JobId, JobResult, JobStatus, PluginData, PollError,
    SubmissionId, TagStat,
};
