use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SubmitUrl {
        submission_id: crate::SubmissionId,
        url: String,
        category: Option<String>,
    },
    UploadFile {
        submission_id: crate::SubmissionId,
        path: PathBuf,
        category: Option<String>,
    },
    PollJob { job_id: crate::JobId },
    /// Every tracked job is terminal; drop the server-side search cache.
    InvalidateCache,
}
