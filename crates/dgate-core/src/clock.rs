//! Time source
//!
//! The confirmation writer reads time through an injected [`Clock`]. Production
//! code uses the shared wall clock from [`system_clock`]; tests pass a
//! [`FixedClock`].

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;

/// Source of the current instant
pub trait Clock: Debug + Send + Sync {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

static SYSTEM_CLOCK: Lazy<Arc<dyn Clock>> = Lazy::new(|| Arc::new(SystemClock));

/// Process-wide wall clock
#[inline]
#[must_use]
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::clone(&SYSTEM_CLOCK)
}

/// Clock frozen at a settable instant
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Freeze at `instant`
    #[inline]
    #[must_use]
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    /// Jump to `instant`
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock() = instant;
    }

    /// Move forward by `delta`
    pub fn advance(&self, delta: chrono::Duration) {
        let mut instant = self.instant.lock();
        *instant += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock()
    }
}

/// Render an instant for the timestamp annotation
///
/// Layout: `2006-01-02 15:04:05.123 +0000 UTC`. Fractional seconds are
/// omitted when zero and otherwise printed with 3, 6, or 9 digits.
#[must_use]
pub fn render_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S%.f +0000 UTC").to_string()
}
