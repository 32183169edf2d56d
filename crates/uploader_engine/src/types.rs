use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub type JobId = u64;
pub type SubmissionId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("unexpected response: {0}")]
    Decode(String),
    /// The server answered but refused the operation.
    #[error("{0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Why a poller gave up on a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("job failed: {0}")]
    Job(String),
    #[error("status query failed: {0}")]
    Query(#[from] ApiError),
    #[error("job still pending after {cycles} status checks")]
    Timeout { cycles: u32 },
}

/// Payload of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct JobResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Finished(JobResult),
    Failed(String),
}

/// The engine thread is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("upload engine stopped")]
pub struct EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Bytes of a file upload handed to the connection so far.
    UploadProgress {
        submission_id: SubmissionId,
        sent: u64,
        total: u64,
    },
    SubmissionCompleted {
        submission_id: SubmissionId,
        result: Result<JobId, ApiError>,
    },
    JobFinished {
        job_id: JobId,
        result: Result<JobResult, PollError>,
    },
    CacheInvalidated {
        result: Result<(), ApiError>,
    },
}

/// Tag usage entry from the database statistics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagStat {
    #[serde(default)]
    pub namespace: String,
    pub text: String,
    #[serde(default)]
    pub weight: u64,
}

/// Data returned by a metadata plugin run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PluginData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub new_tags: String,
}

/// Accepts `true`/`false`, `0`/`1` and their string forms.
pub(crate) fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
        Flag::Text(value) => !matches!(value.trim(), "" | "0" | "false"),
    })
}

/// Job ids arrive as numbers or numeric strings.
pub(crate) fn deserialize_job_id<'de, D>(deserializer: D) -> Result<Option<JobId>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(JobId),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Int(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
