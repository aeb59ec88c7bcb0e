//! Minimum-interval pacing for dependent sequential calls.

use crate::utils::error::{FeedIndexerError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Spaces out the calls of one flight by a fixed minimum interval.
///
/// The first call goes out immediately; each later call waits until
/// `interval` has passed since the previous one started. A pacer is owned by
/// a single flight, so unrelated flights never wait on each other.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// A pacer that never waits.
    #[must_use]
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the next call may start.
    ///
    /// # Errors
    ///
    /// Returns [`FeedIndexerError::Cancelled`] if `cancel` fires first.
    pub async fn ready(&mut self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(FeedIndexerError::Cancelled);
        }
        if let Some(last) = self.last {
            let due = last + self.interval;
            if Instant::now() < due {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(FeedIndexerError::Cancelled),
                    () = tokio::time::sleep_until(due) => {}
                }
            }
        }
        self.last = Some(Instant::now());
        Ok(())
    }
}
