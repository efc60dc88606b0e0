use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// Source of wall-clock time for the session engine.
///
/// Every time-dependent operation in this crate takes `now` explicitly; the
/// owning layer holds a `Clock` and samples it. `Manual` is a shared handle,
/// so a test can advance time underneath a running session (simulating a
/// backgrounded app or a slow network call).
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
    Manual(ManualClock),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns a shared, manually advanced clock starting at `at`.
    #[must_use]
    pub fn manual(at: DateTime<Utc>) -> (Self, ManualClock) {
        let handle = ManualClock::new(at);
        (Self::Manual(handle.clone()), handle)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
            Clock::Manual(handle) => handle.now(),
        }
    }

    /// Advance a fixed or manual clock by the given duration.
    ///
    /// Has no effect on `Clock::System`.
    pub fn advance(&mut self, delta: Duration) {
        match self {
            Clock::System => {}
            Clock::Fixed(t) => *t += delta,
            Clock::Manual(handle) => handle.advance(delta),
        }
    }

    /// Returns true if this clock represents real time.
    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Clock::System)
    }
}

/// Shared handle behind `Clock::Manual`. Clones observe the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    at: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at: Arc::new(Mutex::new(at)),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        *self.at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn advance(&self, delta: Duration) {
        let mut guard = self.at.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += delta;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.at.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(FIXED_TEST_TIMESTAMP)
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let (clock, handle) = Clock::manual(fixed_now());
        handle.advance(Duration::seconds(90));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(90));

        let copy = clock.clone();
        handle.set(fixed_now());
        assert_eq!(copy.now(), fixed_now());
    }

    #[test]
    fn system_clock_ignores_advance() {
        let mut clock = Clock::system();
        clock.advance(Duration::days(3));
        assert!(clock.is_system());
    }

    #[test]
    fn fixed_clock_advances_in_place() {
        let mut clock = fixed_clock();
        clock.advance(Duration::milliseconds(1_500));
        assert_eq!(clock.now(), fixed_now() + Duration::milliseconds(1_500));
    }
}
