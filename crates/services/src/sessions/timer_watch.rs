use chrono::{DateTime, Utc};
use tokio::sync::watch;

use quiz_core::TimerState;

use crate::Clock;

/// Read-only view of a session timer for display loops.
///
/// The owning `QuizSession` publishes every timer transition as one
/// `TimerState` value; a display task can sample at any cadence without
/// touching the session. Polling frequency has no effect on the value.
#[derive(Debug, Clone)]
pub struct TimerWatch {
    rx: watch::Receiver<TimerState>,
    clock: Clock,
    time_limit_secs: Option<u64>,
}

impl TimerWatch {
    pub(crate) fn new(
        rx: watch::Receiver<TimerState>,
        clock: Clock,
        time_limit_secs: Option<u64>,
    ) -> Self {
        Self {
            rx,
            clock,
            time_limit_secs,
        }
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        *self.rx.borrow()
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.state().sample(self.clock.now())
    }

    #[must_use]
    pub fn remaining_secs(&self) -> Option<u64> {
        let state = self.state();
        let now = self.clock.now();
        self.time_limit_secs
            .map(|limit| state.remaining(limit, now))
    }

    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        let state = self.state();
        self.time_limit_secs.and_then(|limit| state.deadline(limit))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Wait for the next freeze/resume/start. Returns false once the
    /// session has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
