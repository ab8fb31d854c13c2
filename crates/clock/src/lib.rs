//! # Clock - Injected Time Source
//!
//! Every time-dependent decision in the recorder (journal day rollover,
//! index version stamping) asks a [`Clock`] instead of reading the wall clock
//! directly. Production code passes a [`SystemClock`]; tests pass a
//! [`ManualClock`] and move it across day boundaries explicitly.
//!
//! All calendar days are UTC.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// Earliest representable instant. Marks "valid since forever".
pub const EARLIEST: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Latest representable instant. Marks "still current".
pub const LATEST: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

/// Source of "now" and "today".
pub trait Clock: Send + Sync + Debug {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle and hand
/// another to the component under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jumps to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = instant;
    }

    /// Moves the clock forward (or backward, for a negative `by`).
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared handle to the wall clock.
pub fn system() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Nanoseconds since the Unix epoch, clamped onto `i64::MIN..=i64::MAX` for
/// instants outside the representable range (roughly 1677..2262).
pub fn to_nanos_saturating(instant: DateTime<Utc>) -> i64 {
    match instant.timestamp_nanos_opt() {
        Some(n) => n,
        None if instant.timestamp() < 0 => i64::MIN,
        None => i64::MAX,
    }
}

#[cfg(test)]
mod tests;
