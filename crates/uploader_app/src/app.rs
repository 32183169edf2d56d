use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use uploader_core::{update, AppState, JobState, Msg};
use uploader_logging::uploader_debug;

use crate::effects::EffectRunner;
use crate::render::Renderer;

/// How long the loop waits for engine events before a render tick.
const TICK: Duration = Duration::from_millis(75);

/// Final tally of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub completed: u64,
    /// Failed jobs plus submissions that never became jobs.
    pub failed: u64,
}

/// Drives one upload session until every submission has settled.
///
/// All state mutation happens here, one message at a time.
pub fn run_session<W: Write>(
    runner: &EffectRunner,
    renderer: &mut Renderer<W>,
    initial: Vec<Msg>,
) -> anyhow::Result<SessionReport> {
    let mut state = AppState::new();
    for msg in initial {
        state = dispatch(state, msg, runner, renderer)?;
    }

    while !state.is_settled() {
        let msg = runner
            .next_msg(TICK)
            .context("upload session ended before every job settled")?
            .unwrap_or(Msg::Tick);
        state = dispatch(state, msg, runner, renderer)?;
    }
    uploader_debug!("Session settled");

    let view = state.view();
    let rejected = view
        .rows
        .iter()
        .filter(|row| row.state == JobState::Rejected)
        .count() as u64;
    Ok(SessionReport {
        completed: view.summary.counts.completed,
        failed: view.summary.counts.failed + rejected,
    })
}

fn dispatch<W: Write>(
    state: AppState,
    msg: Msg,
    runner: &EffectRunner,
    renderer: &mut Renderer<W>,
) -> anyhow::Result<AppState> {
    let (mut state, effects) = update(state, msg);
    runner.enqueue(effects);

    if state.consume_dirty() {
        let view = state.view();
        renderer.render(&view)?;
        if !view.notifications.is_empty() {
            let (next, _) = update(state, Msg::NotificationsDismissed);
            state = next;
            state.consume_dirty();
        }
    }
    Ok(state)
}
