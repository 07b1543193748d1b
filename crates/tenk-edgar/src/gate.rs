//! Shared outbound rate gate.

use std::time::Duration;

use tenk_core::{Error, Result};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Default spacing between requests: 10 requests/second (SEC fair access policy).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Gate spacing outbound requests by a fixed minimum interval.
///
/// One gate is shared (behind an `Arc`) by every request of an ingestion run.
/// Waiters queue on a fair mutex, so permits are granted in FIFO order across
/// concurrent fetch workers. Time comes from `tokio::time`, which lets tests
/// drive the gate with a paused clock.
#[derive(Debug)]
pub struct RateGate {
    next_slot: Mutex<Instant>,
    interval: Duration,
}

impl RateGate {
    /// Creates a gate granting at most one permit per `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            next_slot: Mutex::new(Instant::now()),
            interval,
        }
    }

    /// Creates a gate granting at most `requests` permits per second.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] if `requests` is zero.
    pub fn per_second(requests: u32) -> Result<Self> {
        if requests == 0 {
            return Err(Error::InvalidParameter(
                "requests per second must be positive".to_string(),
            ));
        }
        Ok(Self::new(Duration::from_secs(1) / requests))
    }

    /// Minimum spacing between permits.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for the next permit.
    pub async fn acquire(&self) {
        let mut next = self.next_slot.lock().await;
        let slot = (*next).max(Instant::now());
        if slot > Instant::now() {
            trace!(wait_ms = (slot - Instant::now()).as_millis() as u64, "Rate gate waiting");
        }
        sleep_until(slot).await;
        *next = slot + self.interval;
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}
