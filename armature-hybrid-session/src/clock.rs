//! Time source for expiry calculations.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" as Unix-epoch seconds.
///
/// Every backend computes and checks expiry through a `Clock`, so tests can
/// move time forward without sleeping.
pub trait Clock: Send + Sync {
    /// Current time in seconds since the Unix epoch.
    fn now(&self) -> i64;

    /// Absolute expiry `seconds` from now, saturating at `i64::MAX`.
    fn expires_in(&self, seconds: u64) -> i64 {
        self.now()
            .saturating_add(i64::try_from(seconds).unwrap_or(i64::MAX))
    }
}

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }

    /// Shared handle, the form backends take.
    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually controlled clock for tests.
///
/// Clones share the same instant, so a test can keep one handle and hand
/// another to the stores under test.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<AtomicI64>,
}

impl MockClock {
    /// Create a mock clock frozen at `now`.
    pub fn new(now: i64) -> Self {
        Self {
            current: Arc::new(AtomicI64::new(now)),
        }
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.current.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: i64) {
        self.current.store(now, Ordering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(chrono::Utc::now().timestamp())
    }
}

impl Clock for MockClock {
    fn now(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }
}
