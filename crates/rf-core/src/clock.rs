// SPDX-License-Identifier: MIT

//! Clock abstraction so lifecycle timing (session timeouts, freshness decay,
//! poll cadence) is deterministic under test.

use chrono::{DateTime, Utc};

/// Source of wall-clock time, injected rather than read ambiently.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;

    fn epoch_ms(&self) -> u64 {
        self.now().timestamp_millis().max(0) as u64
    }
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed/advanceable clock for tests.
#[derive(Clone)]
pub struct FakeClock {
    now: std::sync::Arc<parking_lot::Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Arc::new(parking_lot::Mutex::new(start)),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = FakeClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(30));
    }
}
