use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Keeps consecutive upstream requests at least `min_interval` apart
#[derive(Debug, Clone)]
pub struct Pacer {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Pacer that never waits
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request is allowed, then record it
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Pacing upstream requests, waiting {:?}", wait_time);
                sleep(wait_time).await;
            }
        }

        self.last_request = Some(Instant::now());
    }
}
