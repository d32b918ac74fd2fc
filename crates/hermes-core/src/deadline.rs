use std::time::Duration;

use tokio::time::Instant;

/// Absolute wall-clock bound for one submit + poll session.
///
/// The deadline is fixed when the session starts and is consulted at every
/// suspension point, so neither a slow network call nor a long backoff
/// sleep can overshoot it.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Deadline at an absolute instant.
    pub fn at(instant: Instant) -> Self {
        Self { at: instant }
    }

    /// The instant the deadline fires.
    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left, or `None` once expired.
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        if now >= self.at {
            None
        } else {
            Some(self.at - now)
        }
    }
}
