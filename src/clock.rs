//! Monotonic time sources for TTL evaluation.
//!
//! The engine compares `expires_at` deadlines against a [`Clock`] rather than
//! calling `Instant::now()` directly, so tests can drive expiration
//! deterministically with a [`ManualClock`] instead of sleeping.
//!
//! Event timestamps are wall-clock (`SystemTime`) and are not routed through
//! this trait; only TTL arithmetic is.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic time source.
///
/// Implementations must be cheap to call; `now()` sits on the hot path of
/// every cache operation that touches a TTL.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;
}

/// Production clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock that only moves when told to.
///
/// Starts at an arbitrary origin and advances by explicit calls to
/// [`advance`](ManualClock::advance). Shared across threads via `Arc`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use freqcache::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let before = clock.now();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now() - before, Duration::from_secs(5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a clock frozen at its origin.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}
