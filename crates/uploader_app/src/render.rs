//! Terminal rendering of the upload view model.
//!
//! Only what changed since the previous render is printed: rows whose status
//! line moved, the counter summary, and new notifications.

use std::collections::HashMap;
use std::io::{self, Write};

use chrono::Local;
use uploader_core::{
    AppViewModel, CounterSummary, JobState, Notification, Severity, StatusIcon, SubmissionId,
};

pub struct Renderer<W: Write> {
    out: W,
    rows: HashMap<SubmissionId, String>,
    summary: Option<(String, String, StatusIcon)>,
    timestamps: bool,
    /// Server root that relative edit links are resolved against.
    link_base: Option<String>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            rows: HashMap::new(),
            summary: None,
            timestamps: true,
            link_base: None,
        }
    }

    /// Prints edit links as absolute URLs under `base`.
    pub fn with_link_base(mut self, base: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        self.link_base = Some(base);
        self
    }

    #[cfg(test)]
    fn without_timestamps(out: W) -> Self {
        Self {
            timestamps: false,
            ..Self::new(out)
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, view: &AppViewModel) -> io::Result<()> {
        for row in &view.rows {
            let line = format!(
                "{} {} - {}{}",
                row_marker(row.state),
                row.name,
                row.detail,
                row.edit_link
                    .as_ref()
                    .map(|link| match &self.link_base {
                        Some(base) => format!(" [{base}{link}]"),
                        None => format!(" [{link}]"),
                    })
                    .unwrap_or_default()
            );
            if self.rows.get(&row.submission_id) != Some(&line) {
                writeln!(self.out, "{line}")?;
                self.rows.insert(row.submission_id, line);
            }
        }

        for notification in &view.notifications {
            self.notify(notification)?;
        }

        self.render_summary(&view.summary)?;
        self.out.flush()
    }

    pub fn notify(&mut self, notification: &Notification) -> io::Result<()> {
        let label = match notification.severity {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Error => "error",
        };
        if self.timestamps {
            write!(self.out, "[{}] ", Local::now().format("%H:%M:%S"))?;
        }
        match &notification.text {
            Some(text) => writeln!(self.out, "{label}: {} {text}", notification.heading),
            None => writeln!(self.out, "{label}: {}", notification.heading),
        }
    }

    fn render_summary(&mut self, summary: &CounterSummary) -> io::Result<()> {
        if summary.counts.total == 0 {
            return Ok(());
        }
        let current = (
            summary.progress_text.clone(),
            summary.total_text.clone(),
            summary.icon,
        );
        if self.summary.as_ref() == Some(&current) {
            return Ok(());
        }
        writeln!(
            self.out,
            "{} {} | {}",
            icon_marker(summary.icon),
            summary.total_text,
            summary.progress_text
        )?;
        self.summary = Some(current);
        Ok(())
    }
}

fn row_marker(state: JobState) -> &'static str {
    match state {
        JobState::Queued => "[..]",
        JobState::InFlight => "[~~]",
        JobState::Completed => "[ok]",
        JobState::Failed | JobState::Rejected => "[!!]",
    }
}

fn icon_marker(icon: StatusIcon) -> &'static str {
    match icon {
        StatusIcon::AllDone => "(done)",
        StatusIcon::HasFailures => "(failures)",
        StatusIcon::InProgress => "(working)",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use uploader_core::{update, AppState, JobOutcome, JobResult, Msg};

    use super::*;

    fn rendered(renderer: Renderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn only_changes_are_printed() {
        let (state, _) = update(
            AppState::new(),
            Msg::InputChanged("https://a.example.com/1".to_string()),
        );
        let (state, _) = update(state, Msg::UrlsSubmitted);
        let (state, _) = update(
            state,
            Msg::SubmissionAccepted {
                submission_id: 1,
                job_id: 9,
            },
        );

        let mut renderer = Renderer::without_timestamps(Vec::new());
        renderer.render(&state.view()).unwrap();
        renderer.render(&state.view()).unwrap();

        let (state, _) = update(
            state,
            Msg::JobFinished {
                job_id: 9,
                outcome: JobOutcome::Finished(JobResult {
                    title: Some("Book".to_string()),
                    archive_id: Some("abc".to_string()),
                    message: Some("Added".to_string()),
                    success: true,
                }),
            },
        );
        renderer.render(&state.view()).unwrap();

        assert_eq!(
            rendered(renderer),
            "[~~] https://a.example.com/1 - Processing... (Job #9)\n\
             (working) Total: 0/1 | Processing: 1  Completed: 0  Failed: 0\n\
             [ok] Book - Done. (Added) [edit?id=abc]\n\
             ok: Processed Book Added\n\
             (done) Total: 1/1 | Processing: 0  Completed: 1  Failed: 0\n"
        );
    }

    #[test]
    fn edit_links_resolve_against_the_server() {
        let (state, _) = update(
            AppState::new(),
            Msg::InputChanged("https://a.example.com/1".to_string()),
        );
        let (state, _) = update(state, Msg::UrlsSubmitted);
        let (state, _) = update(
            state,
            Msg::SubmissionAccepted {
                submission_id: 1,
                job_id: 3,
            },
        );
        let (state, _) = update(
            state,
            Msg::JobFinished {
                job_id: 3,
                outcome: JobOutcome::Finished(JobResult {
                    title: Some("Book".to_string()),
                    archive_id: Some("abc".to_string()),
                    message: None,
                    success: true,
                }),
            },
        );

        let mut renderer =
            Renderer::without_timestamps(Vec::new()).with_link_base("http://lrr.local:3000");
        renderer.render(&state.view()).unwrap();
        assert!(rendered(renderer)
            .starts_with("[ok] Book - Done. (no details) [http://lrr.local:3000/edit?id=abc]\n"));
    }

    #[test]
    fn notification_without_text() {
        let mut renderer = Renderer::without_timestamps(Vec::new());
        renderer
            .notify(&Notification::info("No new tags added!", None))
            .unwrap();
        assert_eq!(rendered(renderer), "info: No new tags added!\n");
    }
}
