//! Bounded exponential backoff for registry requests.

use std::future::Future;
use std::time::Duration;

use tenk_core::{Error, Result};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::gate::RateGate;

/// Retry policy for registry requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Policy that makes a single attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Runs `op` until it succeeds or the policy's attempts are exhausted.
///
/// Every attempt first takes a permit from `gate`. `op` reports a failed
/// attempt as a message; exhausting the policy yields [`Error::Fetch`]
/// carrying the last message.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    gate: &RateGate,
    url: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, String>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        gate.acquire().await;
        debug!(url, attempt, "Sending request");

        match op().await {
            Ok(value) => return Ok(value),
            Err(message) => {
                warn!(url, attempt, max_attempts = attempts, error = %message, "Request failed");
                last_error = message;
                if attempt < attempts {
                    sleep(policy.backoff(attempt)).await;
                }
            }
        }
    }

    Err(Error::Fetch {
        url: url.to_string(),
        attempts,
        message: last_error,
    })
}
