//! Exponential backoff

use std::time::Duration;

/// Iterator over exponentially growing delays
///
/// Yields `initial * multiplier^n` for each retry until `limit` retries have been handed out.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
    limit: u32,
    multiplier: u32,
    delay: Duration,
}

impl Backoff {
    /// Creates a backoff starting at `initial` that gives up after `limit` retries
    pub fn new(initial: Duration, multiplier: u32, limit: u32) -> Self {
        Self {
            attempt: 0,
            limit,
            multiplier,
            delay: initial,
        }
    }

    /// Starts over from the first delay, e.g. after a job became ready again
    pub fn reset(&mut self, initial: Duration) {
        self.attempt = 0;
        self.delay = initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(25), 2, 13)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.attempt >= self.limit {
            return None;
        }

        self.attempt += 1;
        self.delay *= self.multiplier;
        Some(self.delay)
    }
}
