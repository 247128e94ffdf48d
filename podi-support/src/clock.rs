//! Monotonic registration clock.
//!
//! Registrations are ordered by `(weight, timestamp)`. Wall-clock
//! milliseconds alone are not enough: two registrations in the same
//! millisecond (or a clock stepping backwards) would tie. [`MonotonicClock`]
//! issues timestamps that follow the wall clock but are always strictly
//! greater than the previous one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Issues strictly increasing millisecond timestamps.
///
/// # Examples
/// ```
/// use podi_support::clock::MonotonicClock;
///
/// let clock = MonotonicClock::new();
/// let a = clock.next();
/// let b = clock.next();
/// assert!(b > a);
/// ```
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicU64,
}

impl MonotonicClock {
    /// Creates a clock that has not issued anything yet.
    pub const fn new() -> Self {
        Self { last: AtomicU64::new(0) }
    }

    /// Returns the next timestamp.
    ///
    /// Equal to the current wall-clock time in milliseconds unless that is not
    /// greater than the last issued value, in which case `last + 1`.
    pub fn next(&self) -> u64 {
        self.next_from(now_millis())
    }

    /// Last issued timestamp, `0` before the first call to [`next`](Self::next).
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }

    fn next_from(&self, now: u64) -> u64 {
        let mut issued = now;
        // fetch_update retries on contention, so every caller gets a distinct value
        let _ = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                issued = if now <= last { last + 1 } else { now };
                Some(issued)
            });
        issued
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
