//! Host-driven logical time.
//!
//! The core never reads a wall clock. The host reports the current time
//! (milliseconds from any fixed origin) through [`Clock::advance_to`], and
//! timers such as target debouncing fire against that value. This keeps
//! every run reproducible from its event log.

/// Milliseconds on the host's clock.
pub type Millis = u64;

/// Monotonic logical clock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clock {
    now: Millis,
    /// Number of times the host reported a time earlier than `now`.
    rewinds: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn rewinds(&self) -> u64 {
        self.rewinds
    }

    /// Move to `now`. Earlier times are ignored so timers never run backwards.
    /// Returns the elapsed milliseconds.
    pub fn advance_to(&mut self, now: Millis) -> Millis {
        if now < self.now {
            self.rewinds += 1;
            tracing::debug!(reported = now, current = self.now, "ignoring clock rewind");
            return 0;
        }
        let elapsed = now - self.now;
        self.now = now;
        elapsed
    }

    /// Move forward by `dt` milliseconds.
    pub fn advance_by(&mut self, dt: Millis) -> Millis {
        let target = self.now.saturating_add(dt);
        self.advance_to(target)
    }
}
