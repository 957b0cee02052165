use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::util::duration_to_millis;

/// Milliseconds elapsed since the node started
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The node start instant
    pub const ZERO: Timestamp = Timestamp(0);

    /// Creates a timestamp from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Returns the timestamp in milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later
    pub fn saturating_elapsed_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Subtracts a duration, or `None` if it reaches before node start
    pub fn checked_sub(&self, duration: Duration) -> Option<Timestamp> {
        self.0.checked_sub(duration_to_millis(duration)).map(Timestamp)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration_to_millis(rhs)))
    }
}

/// Source of node-local time
pub trait Clock: Send + Sync {
    /// Current time since node start
    fn now(&self) -> Timestamp;
}

/// Clock backed by the monotonic system clock
///
/// Reads tokio's clock, so it follows paused time in tests.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose zero is the moment of construction
    pub fn new() -> Self {
        MonotonicClock {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp(duration_to_millis(self.start.elapsed()))
    }
}

/// Manually driven clock shared between clones
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock starting at `start`
    pub fn new(start: Timestamp) -> Self {
        ManualClock {
            millis: Arc::new(AtomicU64::new(start.0)),
        }
    }

    /// Sets the current time
    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.0, Ordering::Release);
    }

    /// Moves the clock forward and returns the new time
    pub fn advance(&self, by: Duration) -> Timestamp {
        let millis = duration_to_millis(by);
        let previous = self.millis.fetch_add(millis, Ordering::AcqRel);
        Timestamp(previous.saturating_add(millis))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.millis.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(t + Duration::from_millis(500), Timestamp(1_500));
        assert_eq!(t.checked_sub(Duration::from_millis(400)), Some(Timestamp(600)));
        assert_eq!(t.checked_sub(Duration::from_millis(1_001)), None);
        assert_eq!(
            Timestamp(1_500).saturating_elapsed_since(t),
            Duration::from_millis(500)
        );
        assert_eq!(t.saturating_elapsed_since(Timestamp(1_500)), Duration::ZERO);
    }

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new(Timestamp::ZERO);
        let other = clock.clone();

        assert_eq!(clock.advance(Duration::from_millis(250)), Timestamp(250));
        assert_eq!(other.now(), Timestamp(250));

        other.set(Timestamp(3_000));
        assert_eq!(clock.now(), Timestamp(3_000));
    }

    #[test]
    fn test_monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_follows_paused_time() {
        let clock = MonotonicClock::new();
        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now(), Timestamp(1_500));
    }
}
