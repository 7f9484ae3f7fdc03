use rand::Rng;
use std::thread;
use std::time::{Duration, Instant};

/// Sleep for exact milliseconds. Zero returns immediately.
pub fn sleep_ms(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Uniform integer in `[min, max]`, drawn fresh on every call.
/// A reversed range is treated as `[max, min]`.
pub fn random_ms(min: u64, max: u64) -> u64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    rand::thread_rng().gen_range(lo..=hi)
}

/// Monotonic time source for deadlines.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
