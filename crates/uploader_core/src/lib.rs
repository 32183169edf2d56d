//! Uploader core: pure upload-tracking state machine and view-model helpers.
mod counter;
pub mod edit;
mod effect;
mod msg;
mod notification;
mod state;
mod update;
mod view_model;

pub use counter::{
    CounterError, CounterState, Drain, StatusIcon, TerminalOutcome, UploadCounterTracker,
};
pub use effect::Effect;
pub use msg::Msg;
pub use notification::{Notification, Severity};
pub use state::{
    AppState, FailureKind, JobId, JobOutcome, JobResult, JobState, SubmissionId, UploadRow,
};
pub use update::update;
pub use view_model::{AppViewModel, CounterSummary, UploadRowView};
