//! Injectable time source.
//!
//! The container only ever needs wall-clock seconds with one-second
//! granularity; it never sleeps or schedules. Injecting the source keeps the
//! refresh-time and reconfiguration logic deterministic under test.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A monotonic-enough source of wall-clock seconds.
///
/// Implementations must be cheap; the container consults the clock on every
/// `add` and `record_access`.
pub trait Clock: Send + Sync {
    /// Returns the current time in whole seconds since some fixed epoch.
    fn now_secs(&self) -> u32;
}

/// System clock: seconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }
}

/// Manually driven clock for deterministic tests.
///
/// # Example
///
/// ```
/// use wtinylfu::{Clock, ManualClock};
///
/// let clock = ManualClock::new(100);
/// assert_eq!(clock.now_secs(), 100);
/// clock.advance(60);
/// assert_eq!(clock.now_secs(), 160);
/// clock.set(1_000);
/// assert_eq!(clock.now_secs(), 1_000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    /// Creates a clock reading `start` seconds.
    pub fn new(start: u32) -> Self {
        Self {
            now: AtomicU32::new(start),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: u32) {
        self.now.fetch_add(secs, Ordering::Relaxed);
    }

    /// Sets the clock to an absolute value.
    pub fn set(&self, secs: u32) {
        self.now.store(secs, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }
}
