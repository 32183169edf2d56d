use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the URL input box.
    InputChanged(String),
    /// User picked the category new archives are filed under.
    CategoryChanged(Option<String>),
    /// User submitted the URL input; one download job per non-empty line.
    UrlsSubmitted,
    /// User picked local files to upload.
    FilesSelected(Vec<PathBuf>),
    /// Bytes of a file upload sent so far.
    UploadProgress {
        submission_id: crate::SubmissionId,
        sent: u64,
        total: u64,
    },
    /// The server queued a job for a submission.
    SubmissionAccepted {
        submission_id: crate::SubmissionId,
        job_id: crate::JobId,
    },
    /// The submission call itself failed; no job exists.
    SubmissionRejected {
        submission_id: crate::SubmissionId,
        message: String,
    },
    /// A job poller reached a terminal state.
    JobFinished {
        job_id: crate::JobId,
        outcome: crate::JobOutcome,
    },
    /// Cache invalidation returned, with an error message if it failed.
    CacheInvalidated { error: Option<String> },
    /// User acknowledged the pending notifications.
    NotificationsDismissed,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
