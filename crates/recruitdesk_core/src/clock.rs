//! Injectable time source.
//!
//! # Responsibility
//! - Give dedup and intake code a single, swappable notion of "now".
//!
//! # Invariants
//! - Core logic never reads the system clock directly; it asks a `Clock`.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::cell::Cell;

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Current instant at store precision (milliseconds).
    ///
    /// Records built from this value compare equal after a store round-trip.
    fn now_millis(&self) -> DateTime<Utc> {
        self.now().trunc_subsecs(3)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Wall clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn fixed_clock_advances_only_when_told() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::days(2));
        assert_eq!(clock.now(), start + Duration::days(2));

        let shared: &dyn Clock = &clock;
        assert_eq!(shared.now(), start + Duration::days(2));
    }

    #[test]
    fn now_millis_drops_sub_millisecond_precision() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        let clock = FixedClock::new(start + Duration::nanoseconds(1_234_567));

        assert_eq!(clock.now_millis(), start + Duration::milliseconds(1));
    }
}
