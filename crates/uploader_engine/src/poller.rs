//! Job status polling.
//!
//! [`status_stream`] turns repeated status queries into a finite stream that
//! ends after the first terminal snapshot. [`JobStatusPoller`] drives that
//! stream on a runtime and reports the terminal snapshot through exactly one
//! of two callbacks.

use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{stream, Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uploader_logging::{uploader_debug, uploader_trace};

use crate::api::JobStatusSource;
use crate::{JobId, JobResult, JobStatus, PollError};

#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Delay between two status queries. The first query is immediate.
    pub interval: Duration,
    /// Pending answers tolerated before giving up; `None` polls forever.
    pub max_cycles: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_cycles: Some(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSnapshot {
    /// The job is still queued or running; `cycle` counts pending answers.
    Pending { cycle: u32 },
    Finished(JobResult),
    Failed(PollError),
}

impl StatusSnapshot {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusSnapshot::Pending { .. })
    }
}

struct StreamState<S: ?Sized> {
    source: Arc<S>,
    job_id: JobId,
    settings: PollSettings,
    queries: u32,
    pending: u32,
    done: bool,
}

/// Lazily queries `source` until the job is terminal.
///
/// A failed query ends the stream with `PollError::Query`; it is not retried.
pub fn status_stream<S>(
    source: Arc<S>,
    job_id: JobId,
    settings: PollSettings,
) -> impl Stream<Item = StatusSnapshot> + Send + 'static
where
    S: JobStatusSource + ?Sized + 'static,
{
    let state = StreamState {
        source,
        job_id,
        settings,
        queries: 0,
        pending: 0,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        if state.queries > 0 {
            tokio::time::sleep(state.settings.interval).await;
        }
        state.queries += 1;

        let snapshot = match state.source.job_status(state.job_id).await {
            Ok(JobStatus::Pending) => {
                state.pending += 1;
                match state.settings.max_cycles {
                    Some(max) if state.pending >= max => StatusSnapshot::Failed(PollError::Timeout {
                        cycles: state.pending,
                    }),
                    _ => StatusSnapshot::Pending {
                        cycle: state.pending,
                    },
                }
            }
            Ok(JobStatus::Finished(result)) => StatusSnapshot::Finished(result),
            Ok(JobStatus::Failed(message)) => StatusSnapshot::Failed(PollError::Job(message)),
            Err(err) => StatusSnapshot::Failed(PollError::Query(err)),
        };
        state.done = snapshot.is_terminal();
        Some((snapshot, state))
    })
}

type OnComplete = Box<dyn FnOnce(JobResult) + Send>;
type OnFailure = Box<dyn FnOnce(PollError) + Send>;

struct Callbacks {
    on_complete: OnComplete,
    on_failure: OnFailure,
}

type CallbackSlot = Arc<Mutex<Option<Callbacks>>>;

/// Starts one polling task per job on a tokio runtime.
pub struct JobStatusPoller<S: ?Sized> {
    source: Arc<S>,
    settings: PollSettings,
    runtime: Handle,
}

impl<S> JobStatusPoller<S>
where
    S: JobStatusSource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, settings: PollSettings, runtime: Handle) -> Self {
        Self {
            source,
            settings,
            runtime,
        }
    }

    /// Begins polling `job_id` and returns without waiting.
    ///
    /// Exactly one of the callbacks runs, once, unless the handle is
    /// cancelled first. Callbacks run on a runtime worker and must not
    /// cancel their own handle.
    pub fn start<C, F>(&self, job_id: JobId, on_complete: C, on_failure: F) -> PollHandle
    where
        C: FnOnce(JobResult) + Send + 'static,
        F: FnOnce(PollError) + Send + 'static,
    {
        let token = CancellationToken::new();
        let callbacks: CallbackSlot = Arc::new(Mutex::new(Some(Callbacks {
            on_complete: Box::new(on_complete),
            on_failure: Box::new(on_failure),
        })));
        let snapshots = status_stream(self.source.clone(), job_id, self.settings.clone());
        let task = self
            .runtime
            .spawn(drive(job_id, snapshots, token.clone(), callbacks.clone()));

        uploader_debug!("Polling job {}", job_id);
        PollHandle {
            job_id,
            token,
            callbacks,
            task,
        }
    }
}

async fn drive(
    job_id: JobId,
    snapshots: impl Stream<Item = StatusSnapshot>,
    token: CancellationToken,
    callbacks: CallbackSlot,
) {
    let mut snapshots = pin!(snapshots);
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                uploader_debug!("Polling of job {} cancelled", job_id);
                return;
            }
            next = snapshots.next() => next,
        };

        match next {
            Some(StatusSnapshot::Pending { cycle }) => {
                uploader_trace!("Job {} pending (cycle {})", job_id, cycle);
            }
            Some(terminal) => {
                fire(&callbacks, terminal);
                return;
            }
            None => return,
        }
    }
}

fn fire(callbacks: &Mutex<Option<Callbacks>>, snapshot: StatusSnapshot) {
    let mut slot = callbacks.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(callbacks) = slot.take() else {
        return;
    };
    match snapshot {
        StatusSnapshot::Finished(result) => (callbacks.on_complete)(result),
        StatusSnapshot::Failed(err) => (callbacks.on_failure)(err),
        StatusSnapshot::Pending { .. } => {}
    }
}

/// Owner's side of a running poller.
pub struct PollHandle {
    job_id: JobId,
    token: CancellationToken,
    callbacks: CallbackSlot,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Stops polling. Once this returns no callback will run for the job.
    pub fn cancel(&self) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the polling task to end.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}
