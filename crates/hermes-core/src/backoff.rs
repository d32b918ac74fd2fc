use std::time::Duration;

/// Delay before the first progress poll.
pub const POLL_INITIAL_DELAY: Duration = Duration::from_millis(2_000);
/// Ceiling for the poll delay.
pub const POLL_MAX_DELAY: Duration = Duration::from_millis(10_000);
/// Multiplier applied after each still-running progress report.
pub const POLL_GROWTH_FACTOR: f64 = 1.5;

/// Poll delay schedule for one scrape session.
///
/// The delay grows only when a progress report comes back still running,
/// and never shrinks. With the defaults the sleep sequence is 2s, 3s,
/// 4.5s, 6.75s, 10s, 10s, ...
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    factor: f64,
}

impl Default for Backoff {
    /// Production schedule: 2s initial, 10s cap, 1.5x growth.
    fn default() -> Self {
        Self::new(POLL_INITIAL_DELAY, POLL_MAX_DELAY)
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial,
            max,
            factor: POLL_GROWTH_FACTOR,
        }
    }

    /// Overrides the growth factor. Values below 1.0 would shrink the
    /// delay and are not supported.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Delay to sleep before the next poll.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Grows the delay for the next iteration, capped at the maximum.
    pub fn grow(&mut self) {
        self.current = self.current.mul_f64(self.factor).min(self.max);
    }
}
