//! How a polling loop idles between empty polls.
//!
//! Both loops call [`PollSleeper::idle`] once per round after draining the
//! source.  Production code uses [`ThreadSleeper`]; tests substitute a fake
//! that advances a virtual clock or flips the run flag instead of sleeping.

use std::time::Duration;

pub trait PollSleeper {
    /// Suspend the calling loop for roughly `period`.
    fn idle(&mut self, period: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl PollSleeper for ThreadSleeper {
    fn idle(&mut self, period: Duration) {
        if !period.is_zero() {
            std::thread::sleep(period);
        }
    }
}

impl<F: FnMut(Duration)> PollSleeper for F {
    fn idle(&mut self, period: Duration) {
        self(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn thread_sleeper_waits_at_least_the_period() {
        let start = Instant::now();
        ThreadSleeper.idle(Duration::from_millis(5));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn closures_are_sleepers() {
        let mut total = Duration::ZERO;
        let mut fake = |d: Duration| total += d;
        fake.idle(Duration::from_millis(1));
        fake.idle(Duration::from_millis(2));
        assert_eq!(total, Duration::from_millis(3));
    }
}
