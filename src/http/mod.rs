// Shared HTTP plumbing for the model and search clients


use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Build a blocking agent with a global request timeout
#[inline]
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Whether a failed request is worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    FailClient(u16),
    Fail,
}

#[inline]
pub fn classify_error(error: &ureq::Error) -> RetryDecision {
    match error {
        ureq::Error::StatusCode(status) if *status >= 500 => RetryDecision::Retry,
        ureq::Error::StatusCode(status) => RetryDecision::FailClient(*status),
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => RetryDecision::Retry,
        _ => RetryDecision::Fail,
    }
}

/// Delay before the attempt following `attempt` (1-based)
#[inline]
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt.saturating_sub(1)) * 1000)
}

/// Run `request_fn` until it succeeds, a non-retryable error occurs, or
/// `attempts` is exhausted. Server errors and transport failures are retried
/// with exponential backoff; client errors fail immediately.
#[inline]
pub fn send_with_retry<F>(target: &str, attempts: u32, mut request_fn: F) -> Result<String>
where
    F: FnMut() -> Result<String, ureq::Error>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        debug!("HTTP request attempt {}/{} to {}", attempt, attempts, target);

        match request_fn() {
            Ok(response_text) => {
                debug!("Request succeeded on attempt {}", attempt);
                return Ok(response_text);
            }
            Err(error) => match classify_error(&error) {
                RetryDecision::Retry => {
                    warn!(
                        "Retryable error from {}: {}, attempt {}/{}",
                        target, error, attempt, attempts
                    );
                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < attempts {
                        let delay = backoff_delay(attempt);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
                RetryDecision::FailClient(status) => {
                    warn!("Client error (status {}) from {}, not retrying", status, target);
                    return Err(anyhow!("Client error: HTTP {}", status));
                }
                RetryDecision::Fail => {
                    warn!("Non-retryable error from {}: {}", target, error);
                    return Err(anyhow!("Non-retryable error: {}", error));
                }
            },
        }
    }

    error!("All retry attempts failed for request to {}", target);

    Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
}
