// Retry with exponential backoff for the blocking HTTP clients

use anyhow::Result;
use std::time::Duration;
use tracing::{debug, error, warn};

pub(crate) const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub attempts: u32,
    /// Delay before the first retry; doubles on every further attempt
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Run `request_fn` until it succeeds, retrying server (5xx) and
    /// transport errors. Client errors fail immediately.
    pub(crate) fn run<F>(&self, target: &str, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!("HTTP request attempt {}/{}", attempt, attempts);

            let error = match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => error,
            };

            match &error {
                ureq::Error::StatusCode(status) if *status >= 500 => {
                    warn!(
                        "Server error (status {}), attempt {}/{}",
                        status, attempt, attempts
                    );
                }
                ureq::Error::StatusCode(status) => {
                    warn!("Client error (status {}), not retrying", status);
                    return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                }
                ureq::Error::ConnectionFailed
                | ureq::Error::HostNotFound
                | ureq::Error::Timeout(_)
                | ureq::Error::Io(_) => {
                    warn!("Transport error: {}, attempt {}/{}", error, attempt, attempts);
                }
                _ => return Err(anyhow::anyhow!("Non-retryable error: {}", error)),
            }

            last_error = Some(anyhow::anyhow!("Request error: {}", error));

            if attempt < attempts {
                let delay = self
                    .backoff_unit
                    .saturating_mul(EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt - 1));
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for request to {}", target);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}
