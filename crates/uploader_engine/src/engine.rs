use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tokio::runtime::Runtime;
use uploader_logging::{uploader_debug, uploader_info, uploader_warn};

use crate::api::{ArchiveApi, UploadProgress};
use crate::poller::{JobStatusPoller, PollHandle, PollSettings};
use crate::{EngineError, EngineEvent, JobId, SubmissionId};

enum EngineCommand {
    SubmitUrl {
        submission_id: SubmissionId,
        url: String,
        category: Option<String>,
    },
    UploadFile {
        submission_id: SubmissionId,
        path: PathBuf,
        category: Option<String>,
    },
    PollJob {
        job_id: JobId,
    },
    CancelJob {
        job_id: JobId,
    },
    InvalidateCache,
    Shutdown,
}

/// Runs submissions, pollers and cache invalidation on a background runtime
/// and hands results back as [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(api: Arc<dyn ArchiveApi>, poll_settings: PollSettings) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = Runtime::new()?;

        thread::Builder::new()
            .name("uploader-engine".to_string())
            .spawn(move || run_commands(runtime, api, poll_settings, cmd_rx, event_tx))?;

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn submit_url(&self, submission_id: SubmissionId, url: String, category: Option<String>) {
        self.send(EngineCommand::SubmitUrl {
            submission_id,
            url,
            category,
        });
    }

    pub fn upload_file(
        &self,
        submission_id: SubmissionId,
        path: PathBuf,
        category: Option<String>,
    ) {
        self.send(EngineCommand::UploadFile {
            submission_id,
            path,
            category,
        });
    }

    pub fn poll_job(&self, job_id: JobId) {
        self.send(EngineCommand::PollJob { job_id });
    }

    pub fn cancel_job(&self, job_id: JobId) {
        self.send(EngineCommand::CancelJob { job_id });
    }

    pub fn invalidate_cache(&self) {
        self.send(EngineCommand::InvalidateCache);
    }

    /// Cancels every poller and stops the engine thread.
    pub fn shutdown(&self) {
        self.send(EngineCommand::Shutdown);
    }

    /// Waits up to `timeout` for the next event; `Ok(None)` when none arrived.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<EngineEvent>, EngineError> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(EngineError),
        }
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            uploader_warn!("Engine thread is gone; command dropped");
        }
    }
}

/// Forwards upload progress to the event channel, once per whole percent.
struct ChannelProgress {
    submission_id: SubmissionId,
    tx: mpsc::Sender<EngineEvent>,
    last_percent: AtomicU64,
}

impl ChannelProgress {
    fn new(submission_id: SubmissionId, tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            submission_id,
            tx,
            last_percent: AtomicU64::new(u64::MAX),
        }
    }
}

impl UploadProgress for ChannelProgress {
    fn sent(&self, sent: u64, total: u64) {
        let percent = if total == 0 { 100 } else { sent * 100 / total };
        if self.last_percent.swap(percent, Ordering::Relaxed) == percent {
            return;
        }
        let _ = self.tx.send(EngineEvent::UploadProgress {
            submission_id: self.submission_id,
            sent,
            total,
        });
    }
}

fn run_commands(
    runtime: Runtime,
    api: Arc<dyn ArchiveApi>,
    poll_settings: PollSettings,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let poller = JobStatusPoller::new(api.clone(), poll_settings, runtime.handle().clone());
    let mut pollers: HashMap<JobId, PollHandle> = HashMap::new();

    while let Ok(command) = cmd_rx.recv() {
        match command {
            EngineCommand::SubmitUrl {
                submission_id,
                url,
                category,
            } => {
                let api = api.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    let result = api.submit_url(&url, category.as_deref()).await;
                    uploader_info!("Submission {} ({}) -> {:?}", submission_id, url, result);
                    let _ = event_tx.send(EngineEvent::SubmissionCompleted {
                        submission_id,
                        result,
                    });
                });
            }
            EngineCommand::UploadFile {
                submission_id,
                path,
                category,
            } => {
                let api = api.clone();
                let event_tx = event_tx.clone();
                let progress = Arc::new(ChannelProgress::new(submission_id, event_tx.clone()));
                runtime.spawn(async move {
                    let result = api
                        .upload_file(&path, category.as_deref(), progress)
                        .await;
                    uploader_info!(
                        "Submission {} ({}) -> {:?}",
                        submission_id,
                        path.display(),
                        result
                    );
                    let _ = event_tx.send(EngineEvent::SubmissionCompleted {
                        submission_id,
                        result,
                    });
                });
            }
            EngineCommand::PollJob { job_id } => {
                pollers.retain(|_, handle| !handle.is_finished());
                if pollers.contains_key(&job_id) {
                    uploader_warn!("Job {} already has a poller", job_id);
                    continue;
                }
                let complete_tx = event_tx.clone();
                let failure_tx = event_tx.clone();
                let handle = poller.start(
                    job_id,
                    move |result| {
                        let _ = complete_tx.send(EngineEvent::JobFinished {
                            job_id,
                            result: Ok(result),
                        });
                    },
                    move |err| {
                        uploader_warn!("Job {} failed: {}", job_id, err);
                        let _ = failure_tx.send(EngineEvent::JobFinished {
                            job_id,
                            result: Err(err),
                        });
                    },
                );
                pollers.insert(job_id, handle);
            }
            EngineCommand::CancelJob { job_id } => {
                if let Some(handle) = pollers.remove(&job_id) {
                    handle.cancel();
                }
            }
            EngineCommand::InvalidateCache => {
                let api = api.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    let result = api.invalidate_cache().await;
                    uploader_debug!("Search cache invalidation -> {:?}", result);
                    let _ = event_tx.send(EngineEvent::CacheInvalidated { result });
                });
            }
            EngineCommand::Shutdown => break,
        }
    }

    for (_, handle) in pollers.drain() {
        handle.cancel();
    }
    runtime.shutdown_timeout(Duration::from_secs(1));
    uploader_debug!("Engine thread stopped");
}
