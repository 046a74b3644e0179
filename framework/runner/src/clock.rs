use std::time::{Duration, Instant};

/// Where the strategies read the time and sleep.
///
/// Swapping the clock lets tests observe the pauses between periodic iterations without waiting
/// for them.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
