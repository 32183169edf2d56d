use uploader_core::{update, AppState, JobOutcome, JobResult, Msg, StatusIcon};

#[test]
fn summary_text_tracks_counters() {
    let (state, _) = update(
        AppState::new(),
        Msg::InputChanged("https://a.example.com/1\nhttps://a.example.com/2".to_string()),
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
        Msg::SubmissionAccepted {
            submission_id: 2,
            job_id: 4,
        },
    );

    let summary = state.view().summary;
    assert_eq!(summary.progress_text, "Processing: 2  Completed: 0  Failed: 0");
    assert_eq!(summary.total_text, "Total: 0/2");
    assert_eq!(summary.icon, StatusIcon::InProgress);

    let (state, _) = update(
        state,
        Msg::JobFinished {
            job_id: 3,
            outcome: JobOutcome::Finished(JobResult {
                title: Some("First".to_string()),
                archive_id: Some("abc".to_string()),
                message: Some("Archive added".to_string()),
                success: true,
            }),
        },
    );
    let view = state.view();
    assert_eq!(view.summary.progress_text, "Processing: 1  Completed: 1  Failed: 0");
    assert_eq!(view.summary.total_text, "Total: 1/2");
    assert_eq!(view.rows[0].name, "First");
    assert_eq!(view.rows[0].detail, "Done. (Archive added)");
    assert_eq!(view.rows[0].edit_link.as_deref(), Some("edit?id=abc"));
    assert_eq!(view.rows[1].edit_link, None);
}

#[test]
fn empty_state_summary() {
    let summary = AppState::new().view().summary;
    assert_eq!(summary.total_text, "Total: 0/0");
    assert_eq!(summary.icon, StatusIcon::InProgress);
}
