//! Minimum spacing between backend invocations

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    spacing: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last: Mutex::new(None),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait until `spacing` has passed since the previous acquire
    ///
    /// The first call returns immediately. Concurrent callers queue on the
    /// lock, so each one is spaced from the one before it. Returns the
    /// instant the slot was granted.
    pub async fn acquire(&self) -> Instant {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.spacing).await;
        }
        let granted = Instant::now();
        *last = Some(granted);
        granted
    }
}
