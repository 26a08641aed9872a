//! Fixed delay between consecutive records.

use std::time::Duration;

use tokio::time::sleep;

/// Spaces out records so the remote store's rate limit is respected.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    started: bool,
}

impl Pacer {
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: false,
        }
    }

    /// Wait before the next record. The first call returns immediately.
    pub async fn wait(&mut self) {
        if self.started && !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.started = true;
    }
}
