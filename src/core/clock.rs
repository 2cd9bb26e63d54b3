//! Clock
//!
//! Time source for expiration math, injectable so lifecycle tests can move time.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Clock interface.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for testing.
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) -> &Self {
        let mut now = self.now.lock().unwrap();
        *now += by;
        self
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) -> &Self {
        *self.now.lock().unwrap() = to;
        self
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
