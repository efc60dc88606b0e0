//! Anchor-based session timer.
//!
//! Elapsed time is never accumulated by ticks. A running timer stores the
//! wall-clock instant at which elapsed time was zero, and every sample is
//! `now - anchor`. Suspending the process therefore cannot desynchronize the
//! reported time: the first sample after wake-up already includes the gap.

use chrono::{DateTime, Duration, Utc};

/// Timer state as a single tagged value.
///
/// `Copy`, so a reader handed a `TimerState` always sees a consistent
/// anchor/elapsed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Elapsed time is `now - anchor`.
    Running { anchor: DateTime<Utc> },
    /// Elapsed time is fixed at `elapsed_secs`.
    Frozen { elapsed_secs: u64 },
}

impl Default for TimerState {
    fn default() -> Self {
        Self::Frozen { elapsed_secs: 0 }
    }
}

impl TimerState {
    /// A running timer that reports `elapsed_secs` at `now`.
    #[must_use]
    pub fn running_from(elapsed_secs: u64, now: DateTime<Utc>) -> Self {
        Self::Running {
            anchor: anchor_for(elapsed_secs, now),
        }
    }

    /// (Re)start the timer so that it reports `at_elapsed_secs` at `now`.
    pub fn start(&mut self, at_elapsed_secs: u64, now: DateTime<Utc>) {
        *self = Self::running_from(at_elapsed_secs, now);
    }

    /// Whole elapsed seconds at `now`.
    ///
    /// A clock that moved backwards past the anchor yields `0`, never a
    /// negative or wrapped value.
    #[must_use]
    pub fn sample(&self, now: DateTime<Utc>) -> u64 {
        match *self {
            Self::Running { anchor } => {
                let millis = now.signed_duration_since(anchor).num_milliseconds();
                u64::try_from(millis).map_or(0, |ms| ms / 1_000)
            }
            Self::Frozen { elapsed_secs } => elapsed_secs,
        }
    }

    /// Capture the elapsed time and stop the clock. Returns the frozen value.
    ///
    /// Freezing an already frozen timer keeps its value.
    pub fn freeze(&mut self, now: DateTime<Utc>) -> u64 {
        let elapsed_secs = self.sample(now);
        *self = Self::Frozen { elapsed_secs };
        elapsed_secs
    }

    /// Restart a frozen timer from its frozen value. No-op when running.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Self::Frozen { elapsed_secs } = *self {
            *self = Self::running_from(elapsed_secs, now);
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Wall-clock anchor when running.
    #[must_use]
    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Running { anchor } => Some(anchor),
            Self::Frozen { .. } => None,
        }
    }

    /// Frozen elapsed seconds when stopped.
    #[must_use]
    pub fn frozen_elapsed(&self) -> Option<u64> {
        match *self {
            Self::Running { .. } => None,
            Self::Frozen { elapsed_secs } => Some(elapsed_secs),
        }
    }

    /// Seconds left before `limit_secs` is reached. Saturates at zero.
    #[must_use]
    pub fn remaining(&self, limit_secs: u64, now: DateTime<Utc>) -> u64 {
        limit_secs.saturating_sub(self.sample(now))
    }

    /// Wall-clock instant at which `limit_secs` is reached, if running.
    #[must_use]
    pub fn deadline(&self, limit_secs: u64) -> Option<DateTime<Utc>> {
        let anchor = self.anchor()?;
        let limit = Duration::try_seconds(i64::try_from(limit_secs).ok()?)?;
        anchor.checked_add_signed(limit)
    }
}

fn anchor_for(elapsed_secs: u64, now: DateTime<Utc>) -> DateTime<Utc> {
    i64::try_from(elapsed_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|elapsed| now.checked_sub_signed(elapsed))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
