//! Clock implementations for session timing

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::SessionTime;

/// Source of session time
///
/// INVARIANT: `now()` MUST be monotonically non-decreasing
pub trait Clock: Send + Sync {
    /// Current time since the clock's epoch
    fn now(&self) -> SessionTime;
}

/// Wall clock backed by the OS monotonic clock
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    /// Epoch of this clock
    reference: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is now
    pub fn new() -> Self {
        MonotonicClock {
            reference: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> SessionTime {
        let elapsed = Instant::now().duration_since(self.reference);
        SessionTime::from_micros(elapsed.as_micros() as u64)
    }
}

/// Manually driven clock for simulations and tests
///
/// Clones share the same time value.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    value: Arc<Mutex<SessionTime>>,
}

impl ManualClock {
    /// Create a clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by a duration
    /// Returns the new time
    pub fn advance(&self, dt: Duration) -> SessionTime {
        let mut value = self.value.lock();
        *value = value.saturating_add(dt);
        *value
    }

    /// Jump to a specific time
    /// Only allowed to move forward
    pub fn set(&self, target: SessionTime) {
        let mut value = self.value.lock();
        if target > *value {
            *value = target;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SessionTime {
        *self.value.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();

        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now();

        assert!(t2 > t1);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), SessionTime::ZERO);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now().as_millis(), 250);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();

        handle.advance(Duration::from_secs(2));
        assert_eq!(clock.now().as_millis(), 2000);
    }

    #[test]
    fn test_manual_clock_never_moves_back() {
        let clock = ManualClock::new();
        clock.set(SessionTime::from_millis(500));
        clock.set(SessionTime::from_millis(100));

        assert_eq!(clock.now().as_millis(), 500);
    }
}
