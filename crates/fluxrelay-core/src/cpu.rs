use std::hint;
use std::time::{Duration, Instant};

/// CPU relax hint for spin loops (`pause` on x86, `yield` on aarch64).
#[inline(always)]
pub fn relax() {
    hint::spin_loop();
}

/// Busy-wait for `delay` without giving up the core.
///
/// Used between transmit retries on the polling path, where a sleep would
/// hand the core back to the scheduler.
#[inline]
pub fn delay(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    let start = Instant::now();
    while start.elapsed() < delay {
        relax();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_waits_at_least_requested() {
        let start = Instant::now();
        delay(Duration::from_micros(200));
        assert!(start.elapsed() >= Duration::from_micros(200));
    }

    #[test]
    fn test_zero_delay_returns() {
        delay(Duration::ZERO);
    }
}
