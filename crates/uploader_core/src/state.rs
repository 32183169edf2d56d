use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use uploader_logging::{uploader_debug, uploader_info, uploader_warn};

use crate::counter::{Drain, TerminalOutcome, UploadCounterTracker};
use crate::notification::Notification;
use crate::view_model::{AppViewModel, UploadRowView};

/// Server-issued job identifier.
pub type JobId = u64;
/// Local, sequential identifier for one unit of submitted work.
pub type SubmissionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    /// Submission request still outstanding.
    #[default]
    Queued,
    InFlight,
    Completed,
    Failed,
    /// The submission call failed; the work never became a tracked job.
    Rejected,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Rejected)
    }
}

/// Result payload of a job the queue reports as finished.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobResult {
    pub title: Option<String>,
    pub archive_id: Option<String>,
    pub message: Option<String>,
    /// `false` when the job ran but the server could not use the input.
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The job queue reported the job itself as failed.
    Job,
    /// The status query could not be completed.
    Query,
    /// The job stayed pending for longer than the poll budget.
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Finished(JobResult),
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRow {
    pub submission_id: SubmissionId,
    /// URL or file name as submitted.
    pub label: String,
    pub job_id: Option<JobId>,
    pub state: JobState,
    pub title: Option<String>,
    pub archive_id: Option<String>,
    pub message: Option<String>,
    /// Share of a file upload already sent, while the row is queued.
    pub upload_percent: Option<u8>,
}

impl UploadRow {
    fn queued(submission_id: SubmissionId, label: String) -> Self {
        Self {
            submission_id,
            label,
            job_id: None,
            state: JobState::Queued,
            title: None,
            archive_id: None,
            message: None,
            upload_percent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    input: String,
    category: Option<String>,
    next_submission_id: SubmissionId,
    rows: BTreeMap<SubmissionId, UploadRow>,
    jobs: HashMap<JobId, SubmissionId>,
    counters: UploadCounterTracker,
    notifications: Vec<Notification>,
    /// Cache invalidations sent but not yet answered.
    pending_invalidations: u32,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        let rows = self.rows.values().map(UploadRowView::from).collect();
        AppViewModel::new(
            self.input.clone(),
            self.category.clone(),
            rows,
            &self.counters,
            self.notifications.clone(),
            self.dirty,
        )
    }

    pub fn counters(&self) -> &UploadCounterTracker {
        &self.counters
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn row(&self, submission_id: SubmissionId) -> Option<&UploadRow> {
        self.rows.get(&submission_id)
    }

    pub fn row_for_job(&self, job_id: JobId) -> Option<&UploadRow> {
        self.jobs.get(&job_id).and_then(|id| self.rows.get(id))
    }

    /// True once every submission has an answer, every job is terminal and
    /// no cache invalidation is outstanding.
    pub fn is_settled(&self) -> bool {
        self.pending_invalidations == 0
            && self.counters.is_drained()
            && self.rows.values().all(|row| row.state != JobState::Queued)
    }

    /// Returns whether a re-render is due and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_input(&mut self, text: String) {
        if self.input != text {
            self.input = text;
            self.mark_dirty();
        }
    }

    pub(crate) fn take_input(&mut self) -> String {
        self.mark_dirty();
        std::mem::take(&mut self.input)
    }

    pub(crate) fn set_category(&mut self, category: Option<String>) {
        let category = category.filter(|c| !c.trim().is_empty());
        if self.category != category {
            self.category = category;
            self.mark_dirty();
        }
    }

    pub(crate) fn push_notification(&mut self, notification: Notification) {
        self.notifications.push(notification);
        self.mark_dirty();
    }

    pub(crate) fn clear_notifications(&mut self) {
        if !self.notifications.is_empty() {
            self.notifications.clear();
            self.mark_dirty();
        }
    }

    /// Adds a row waiting for its submission call and returns its id.
    pub(crate) fn add_submission(&mut self, label: impl Into<String>) -> SubmissionId {
        self.next_submission_id += 1;
        let submission_id = self.next_submission_id;
        self.rows
            .insert(submission_id, UploadRow::queued(submission_id, label.into()));
        self.mark_dirty();
        submission_id
    }

    pub(crate) fn add_file_submission(&mut self, path: &Path) -> SubmissionId {
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.add_submission(label)
    }

    /// Marks a submission as having failed before any job existed.
    pub(crate) fn reject_submission(&mut self, submission_id: SubmissionId, message: String) {
        let Some(row) = self.rows.get_mut(&submission_id) else {
            uploader_warn!("Rejection for unknown submission {}", submission_id);
            return;
        };
        if row.state != JobState::Queued {
            uploader_warn!(
                "Rejection for submission {} in state {:?} ignored",
                submission_id,
                row.state
            );
            return;
        }
        row.state = JobState::Rejected;
        row.message = Some(message.clone());
        let heading = format!("Error adding job for {}", row.label);
        self.push_notification(Notification::error(heading, message));
    }

    /// Records how much of a queued file upload has been sent.
    pub(crate) fn record_upload_progress(
        &mut self,
        submission_id: SubmissionId,
        sent: u64,
        total: u64,
    ) {
        let Some(row) = self.rows.get_mut(&submission_id) else {
            uploader_warn!("Progress for unknown submission {}", submission_id);
            return;
        };
        if row.state != JobState::Queued {
            return;
        }
        let percent = upload_percent(sent, total);
        if row.upload_percent != Some(percent) {
            row.upload_percent = Some(percent);
            self.mark_dirty();
        }
    }

    /// Binds a job id to a queued submission and starts tracking it.
    ///
    /// Returns false when the acceptance does not apply (unknown or
    /// already-answered submission, or a job id that is already tracked).
    pub(crate) fn accept_submission(&mut self, submission_id: SubmissionId, job_id: JobId) -> bool {
        if self.jobs.contains_key(&job_id) {
            uploader_warn!(
                "Job {} already tracked; submission {} rejected",
                job_id,
                submission_id
            );
            self.reject_submission(submission_id, format!("duplicate job id {job_id}"));
            return false;
        }
        let Some(row) = self.rows.get_mut(&submission_id) else {
            uploader_warn!("Acceptance for unknown submission {}", submission_id);
            return false;
        };
        if row.state != JobState::Queued {
            uploader_warn!(
                "Acceptance for submission {} in state {:?} ignored",
                submission_id,
                row.state
            );
            return false;
        }
        row.state = JobState::InFlight;
        row.job_id = Some(job_id);
        self.jobs.insert(job_id, submission_id);
        self.counters.register_submission();
        uploader_debug!("Submission {} is job {}", submission_id, job_id);
        self.mark_dirty();
        true
    }

    /// Applies a terminal outcome to the job's row and to the counters.
    ///
    /// Returns `None` when the outcome is ignored (unknown or already
    /// terminal job).
    pub(crate) fn apply_outcome(&mut self, job_id: JobId, outcome: JobOutcome) -> Option<Drain> {
        let Some(submission_id) = self.jobs.get(&job_id).copied() else {
            uploader_warn!("Outcome for unknown job {} ignored", job_id);
            return None;
        };
        let row = self.rows.get_mut(&submission_id)?;
        if row.state != JobState::InFlight {
            uploader_warn!("Job {} is already {:?}; outcome ignored", job_id, row.state);
            return None;
        }

        let (terminal, notification) = match outcome {
            JobOutcome::Finished(result) => {
                row.title = result.title.clone();
                row.archive_id = result.archive_id.clone();
                row.message = result.message.clone();
                let name = result.title.unwrap_or_else(|| row.label.clone());
                if result.success {
                    row.state = JobState::Completed;
                    (
                        TerminalOutcome::Completed,
                        Notification::success(format!("Processed {name}"), result.message),
                    )
                } else {
                    row.state = JobState::Failed;
                    let message = result
                        .message
                        .unwrap_or_else(|| "archive could not be processed".to_string());
                    (
                        TerminalOutcome::Failed,
                        Notification::error(format!("Error while processing {name}"), message),
                    )
                }
            }
            JobOutcome::Failed { kind, message } => {
                row.state = JobState::Failed;
                row.message = Some(message.clone());
                let heading = match kind {
                    FailureKind::Job => format!("Error while processing {}", row.label),
                    FailureKind::Query => format!("Error checking job #{job_id} status"),
                    FailureKind::Timeout => format!("Job #{job_id} timed out"),
                };
                (TerminalOutcome::Failed, Notification::error(heading, message))
            }
        };

        uploader_info!("Job {} finished: {:?}", job_id, terminal);
        self.push_notification(notification);
        match self.counters.record_terminal(terminal) {
            Ok(drain) => Some(drain),
            Err(err) => {
                uploader_warn!("Counter update for job {} failed: {}", job_id, err);
                None
            }
        }
    }

    pub fn pending_invalidations(&self) -> u32 {
        self.pending_invalidations
    }

    pub(crate) fn begin_cache_invalidation(&mut self) {
        self.pending_invalidations += 1;
    }

    pub(crate) fn finish_cache_invalidation(&mut self) {
        if self.pending_invalidations == 0 {
            uploader_warn!("Cache invalidation answer without a pending request");
        }
        self.pending_invalidations = self.pending_invalidations.saturating_sub(1);
    }
}

/// Whole percent of `total` covered by `sent`, rounded down and capped at 100.
fn upload_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = u128::from(sent.min(total)) * 100 / u128::from(total);
    u8::try_from(percent).unwrap_or(100)
}
