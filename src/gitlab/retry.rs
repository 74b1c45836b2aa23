// Bounded retry for repository host API calls.
// Linear backoff: attempt N failing waits N * unit before the next one.

use crate::gitlab::GitLabError;
use std::future::Future;
use std::time::Duration;
use tokio_retry::Retry;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Policy that never sleeps between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delays between consecutive attempts; nothing follows the final attempt.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let unit = self.backoff_unit;
        (1..self.max_attempts).map(move |attempt| unit * attempt)
    }

    /// Run `action` until it succeeds or the attempt budget is spent.
    /// The last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut action: F) -> Result<T, GitLabError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GitLabError>>,
    {
        let max_attempts = self.max_attempts;
        let unit = self.backoff_unit;
        let mut attempt = 0u32;

        debug!(operation, max_attempts, "Starting request");

        let result = Retry::spawn(self.delays(), || {
            attempt += 1;
            let current = attempt;
            let request = action();
            async move {
                request.await.inspect_err(|err| {
                    if current < max_attempts {
                        warn!(
                            operation,
                            attempt = current,
                            retry_in_ms = (unit * current).as_millis() as u64,
                            error = %err,
                            "Attempt failed, retrying"
                        );
                    }
                })
            }
        })
        .await;

        if let Err(err) = &result {
            error!(operation, attempts = max_attempts, error = %err, "All attempts failed");
        }
        result
    }
}
