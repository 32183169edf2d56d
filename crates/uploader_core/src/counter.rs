use thiserror::Error;

/// Raw counts behind the upload progress display.
///
/// `completed + failed + in_flight == total` holds after every mutation made
/// through [`UploadCounterTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterState {
    pub total: u64,
    pub in_flight: u64,
    pub completed: u64,
    pub failed: u64,
}

impl CounterState {
    /// Jobs that reached a terminal state, successful or not.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}

/// Overall status shown next to the totals line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIcon {
    AllDone,
    HasFailures,
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    Completed,
    Failed,
}

/// Whether a terminal transition emptied the in-flight set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// `in_flight` went from one to zero with this transition.
    Drained,
    StillRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("terminal outcome recorded with no job in flight")]
    NothingInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadCounterTracker {
    counts: CounterState,
}

impl UploadCounterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> CounterState {
        self.counts
    }

    /// A job id came back from the server; it is now in flight.
    pub fn register_submission(&mut self) {
        self.counts.total += 1;
        self.counts.in_flight += 1;
    }

    /// Moves one in-flight job into the completed or failed bucket.
    ///
    /// Rejected without touching the counts when nothing is in flight.
    pub fn record_terminal(&mut self, outcome: TerminalOutcome) -> Result<Drain, CounterError> {
        if self.counts.in_flight == 0 {
            return Err(CounterError::NothingInFlight);
        }
        self.counts.in_flight -= 1;
        match outcome {
            TerminalOutcome::Completed => self.counts.completed += 1,
            TerminalOutcome::Failed => self.counts.failed += 1,
        }
        if self.counts.in_flight == 0 {
            Ok(Drain::Drained)
        } else {
            Ok(Drain::StillRunning)
        }
    }

    pub fn is_drained(&self) -> bool {
        self.counts.in_flight == 0
    }

    pub fn status_icon(&self) -> StatusIcon {
        let counts = &self.counts;
        if counts.failed > 0 {
            StatusIcon::HasFailures
        } else if counts.total > 0 && counts.completed == counts.total {
            StatusIcon::AllDone
        } else {
            StatusIcon::InProgress
        }
    }
}
