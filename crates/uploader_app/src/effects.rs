use std::time::Duration;

use uploader_core::{Effect, FailureKind, JobOutcome, JobResult, Msg};
use uploader_engine::{EngineError, EngineEvent, EngineHandle, PollError};
use uploader_logging::{uploader_info, uploader_warn};

/// Executes core effects on the engine and turns engine events back into
/// messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SubmitUrl {
                    submission_id,
                    url,
                    category,
                } => {
                    uploader_info!("SubmitUrl submission_id={} url={}", submission_id, url);
                    self.engine.submit_url(submission_id, url, category);
                }
                Effect::UploadFile {
                    submission_id,
                    path,
                    category,
                } => {
                    uploader_info!(
                        "UploadFile submission_id={} path={}",
                        submission_id,
                        path.display()
                    );
                    self.engine.upload_file(submission_id, path, category);
                }
                Effect::PollJob { job_id } => self.engine.poll_job(job_id),
                Effect::InvalidateCache => {
                    uploader_info!("All jobs finished; invalidating search cache");
                    self.engine.invalidate_cache();
                }
            }
        }
    }

    /// Waits up to `timeout` for the next engine event; `Ok(None)` when the
    /// wait timed out.
    pub fn next_msg(&self, timeout: Duration) -> Result<Option<Msg>, EngineError> {
        Ok(self.engine.recv_timeout(timeout)?.map(map_event))
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}

pub fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::UploadProgress {
            submission_id,
            sent,
            total,
        } => Msg::UploadProgress {
            submission_id,
            sent,
            total,
        },
        EngineEvent::SubmissionCompleted {
            submission_id,
            result,
        } => match result {
            Ok(job_id) => Msg::SubmissionAccepted {
                submission_id,
                job_id,
            },
            Err(err) => {
                uploader_warn!("Submission {} failed: {}", submission_id, err);
                Msg::SubmissionRejected {
                    submission_id,
                    message: err.to_string(),
                }
            }
        },
        EngineEvent::JobFinished { job_id, result } => Msg::JobFinished {
            job_id,
            outcome: map_outcome(result),
        },
        EngineEvent::CacheInvalidated { result } => Msg::CacheInvalidated {
            error: result.err().map(|err| err.to_string()),
        },
    }
}

fn map_outcome(result: Result<uploader_engine::JobResult, PollError>) -> JobOutcome {
    match result {
        Ok(result) => JobOutcome::Finished(JobResult {
            title: result.title,
            archive_id: result.id,
            message: result.message,
            success: result.success,
        }),
        Err(err) => {
            let kind = match &err {
                PollError::Job(_) => FailureKind::Job,
                PollError::Query(_) => FailureKind::Query,
                PollError::Timeout { .. } => FailureKind::Timeout,
            };
            let message = match err {
                PollError::Job(message) => message,
                other => other.to_string(),
            };
            JobOutcome::Failed { kind, message }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use uploader_engine::ApiError;

    use super::*;

    #[test]
    fn rejected_submission_keeps_error_text() {
        let msg = map_event(EngineEvent::SubmissionCompleted {
            submission_id: 4,
            result: Err(ApiError::Rejected("Unsupported URL".to_string())),
        });
        assert_eq!(
            msg,
            Msg::SubmissionRejected {
                submission_id: 4,
                message: "Unsupported URL".to_string(),
            }
        );
    }

    #[test]
    fn poll_errors_map_to_failure_kinds() {
        let msg = map_event(EngineEvent::JobFinished {
            job_id: 2,
            result: Err(PollError::Query(ApiError::HttpStatus(502))),
        });
        assert_eq!(
            msg,
            Msg::JobFinished {
                job_id: 2,
                outcome: JobOutcome::Failed {
                    kind: FailureKind::Query,
                    message: "status query failed: http status 502".to_string(),
                },
            }
        );

        let msg = map_event(EngineEvent::JobFinished {
            job_id: 3,
            result: Err(PollError::Job("Unsupported file".to_string())),
        });
        assert_eq!(
            msg,
            Msg::JobFinished {
                job_id: 3,
                outcome: JobOutcome::Failed {
                    kind: FailureKind::Job,
                    message: "Unsupported file".to_string(),
                },
            }
        );
    }

    #[test]
    fn upload_progress_is_forwarded() {
        let msg = map_event(EngineEvent::UploadProgress {
            submission_id: 3,
            sent: 10,
            total: 40,
        });
        assert_eq!(
            msg,
            Msg::UploadProgress {
                submission_id: 3,
                sent: 10,
                total: 40,
            }
        );
    }

    #[test]
    fn finished_job_maps_archive_id() {
        let msg = map_event(EngineEvent::JobFinished {
            job_id: 1,
            result: Ok(uploader_engine::JobResult {
                title: Some("Book".to_string()),
                id: Some("abc".to_string()),
                message: None,
                success: true,
            }),
        });
        let Msg::JobFinished { outcome, .. } = msg else {
            panic!("expected a finished job message");
        };
        assert_eq!(
            outcome,
            JobOutcome::Finished(JobResult {
                title: Some("Book".to_string()),
                archive_id: Some("abc".to_string()),
                message: None,
                success: true,
            })
        );
    }
}
