use crate::counter::{CounterState, StatusIcon, UploadCounterTracker};
use crate::notification::Notification;
use crate::{JobId, JobState, SubmissionId, UploadRow};

/// Display summary derived from the counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSummary {
    pub counts: CounterState,
    pub icon: StatusIcon,
    /// "Processing: p  Completed: c  Failed: f"
    pub progress_text: String,
    /// "Total: finished/total"
    pub total_text: String,
}

impl CounterSummary {
    pub fn from_tracker(tracker: &UploadCounterTracker) -> Self {
        let counts = tracker.counts();
        Self {
            counts,
            icon: tracker.status_icon(),
            progress_text: format!(
                "Processing: {}  Completed: {}  Failed: {}",
                counts.in_flight, counts.completed, counts.failed
            ),
            total_text: format!("Total: {}/{}", counts.finished(), counts.total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppViewModel {
    pub input: String,
    pub category: Option<String>,
    pub rows: Vec<UploadRowView>,
    pub summary: CounterSummary,
    pub notifications: Vec<Notification>,
    pub dirty: bool,
}

impl AppViewModel {
    pub(crate) fn new(
        input: String,
        category: Option<String>,
        rows: Vec<UploadRowView>,
        counters: &UploadCounterTracker,
        notifications: Vec<Notification>,
        dirty: bool,
    ) -> Self {
        Self {
            input,
            category,
            rows,
            summary: CounterSummary::from_tracker(counters),
            notifications,
            dirty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRowView {
    pub submission_id: SubmissionId,
    pub job_id: Option<JobId>,
    pub name: String,
    pub state: JobState,
    /// Status line shown next to the name.
    pub detail: String,
    /// Where the archive can be edited, once the server assigned an id.
    pub edit_link: Option<String>,
}

impl From<&UploadRow> for UploadRowView {
    fn from(row: &UploadRow) -> Self {
        let name = row.title.clone().unwrap_or_else(|| row.label.clone());
        let message = row.message.as_deref().unwrap_or("no details");
        let detail = match (row.state, row.job_id) {
            (JobState::Queued, _) => match row.upload_percent {
                Some(percent) => format!("Uploading... {percent}%"),
                None => "Submitting...".to_string(),
            },
            (JobState::InFlight, Some(job_id)) => format!("Processing... (Job #{job_id})"),
            (JobState::InFlight, None) => "Processing...".to_string(),
            (JobState::Completed, _) => format!("Done. ({message})"),
            (JobState::Failed, _) => format!("Error while processing archive. ({message})"),
            (JobState::Rejected, _) => format!("Could not be submitted. ({message})"),
        };
        Self {
            submission_id: row.submission_id,
            job_id: row.job_id,
            name,
            state: row.state,
            detail,
            edit_link: row.archive_id.as_ref().map(|id| format!("edit?id={id}")),
        }
    }
}
