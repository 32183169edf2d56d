use url::Url;

use uploader_logging::{uploader_debug, uploader_warn};

use crate::counter::Drain;
use crate::notification::Notification;
use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::InputChanged(text) => {
            state.set_input(text);
            Vec::new()
        }
        Msg::CategoryChanged(category) => {
            state.set_category(category);
            Vec::new()
        }
        Msg::UrlsSubmitted => {
            let raw = state.take_input();
            let category = state.category().map(ToOwned::to_owned);
            let mut effects = Vec::new();
            for line in parse_lines(&raw) {
                let submission_id = state.add_submission(line.clone());
                match validate_url(&line) {
                    Ok(url) => effects.push(Effect::SubmitUrl {
                        submission_id,
                        url,
                        category: category.clone(),
                    }),
                    Err(message) => state.reject_submission(submission_id, message),
                }
            }
            uploader_debug!("UrlsSubmitted produced {} submissions", effects.len());
            effects
        }
        Msg::FilesSelected(paths) => {
            let category = state.category().map(ToOwned::to_owned);
            paths
                .into_iter()
                .map(|path| {
                    let submission_id = state.add_file_submission(&path);
                    Effect::UploadFile {
                        submission_id,
                        path,
                        category: category.clone(),
                    }
                })
                .collect::<Vec<_>>()
        }
        Msg::UploadProgress {
            submission_id,
            sent,
            total,
        } => {
            state.record_upload_progress(submission_id, sent, total);
            Vec::new()
        }
        Msg::SubmissionAccepted {
            submission_id,
            job_id,
        } => {
            if state.accept_submission(submission_id, job_id) {
                vec![Effect::PollJob { job_id }]
            } else {
                Vec::new()
            }
        }
        Msg::SubmissionRejected {
            submission_id,
            message,
        } => {
            state.reject_submission(submission_id, message);
            Vec::new()
        }
        Msg::JobFinished { job_id, outcome } => match state.apply_outcome(job_id, outcome) {
            Some(Drain::Drained) => {
                state.begin_cache_invalidation();
                vec![Effect::InvalidateCache]
            }
            Some(Drain::StillRunning) | None => Vec::new(),
        },
        Msg::CacheInvalidated { error } => {
            state.finish_cache_invalidation();
            if let Some(error) = error {
                uploader_warn!("Search cache invalidation failed: {}", error);
                state.push_notification(Notification::error(
                    "Error while clearing the search cache",
                    error,
                ));
            }
            Vec::new()
        }
        Msg::NotificationsDismissed => {
            state.clear_notifications();
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

/// Splits raw input into trimmed, non-empty lines.
fn parse_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn validate_url(line: &str) -> Result<String, String> {
    let url = Url::parse(line).map_err(|err| format!("invalid url: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(format!("unsupported url scheme {other}")),
    }
}
