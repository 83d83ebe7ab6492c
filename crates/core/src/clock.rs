//! Injectable wall-clock seam.
//!
//! Rate-limit windows, circuit backoff, TTL expiry, and the instance
//! heartbeat all depend on elapsed time. Threading a [`Clock`] through
//! these components instead of calling `SystemTime::now()` directly keeps
//! the scenarios in §8 (S2, S3, S4) deterministic under test without
//! resorting to real sleeps.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current wall-clock time, in milliseconds since epoch.
pub trait Clock: Send + Sync {
    /// Current time, milliseconds since Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_millis() as i64
    }
}

/// A manually-advanced clock for deterministic tests.
#[derive(Debug)]
pub struct TestClock(AtomicI64);

impl TestClock {
    /// Create a clock starting at the given millisecond timestamp.
    pub fn new(start_millis: i64) -> Self {
        Self(AtomicI64::new(start_millis))
    }

    /// Advance the clock by `delta_ms` milliseconds and return the new time.
    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.0.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }

    /// Set the clock to an absolute timestamp.
    pub fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_monotonically() {
        let clock = TestClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        assert_eq!(clock.advance(500), 1_500);
        assert_eq!(clock.now_millis(), 1_500);
    }
}
