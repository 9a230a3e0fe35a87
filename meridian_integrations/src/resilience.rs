//! Retry, backoff, and timeout handling for provider requests.
//!
//! Transient failures (timeouts, connection errors, 5xx, 429) are retried a
//! bounded number of times with exponential backoff; anything else fails the
//! fetch immediately.

use std::future::Future;
use std::time::Duration;

use meridian_core::{Error, Result};

/// Per-provider retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Per-attempt request bound.
    pub timeout: Duration,
    /// Retries after the first attempt, transient failures only.
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each retry).
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry N (zero-based), capped at 64x the base.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << attempt.min(6))
    }
}

/// A single failed attempt, classified by whether retrying can help.
#[derive(Debug)]
pub enum AttemptFailure {
    Transient(Error),
    Fatal(Error),
}

/// Classifies a transport-level `reqwest` failure.
pub fn classify_send(provider: &str, e: reqwest::Error) -> AttemptFailure {
    if e.is_timeout() || e.is_connect() {
        AttemptFailure::Transient(Error::fetch(provider, "request failed", e))
    } else {
        AttemptFailure::Fatal(Error::fetch(provider, "request failed", e))
    }
}

/// Classifies a non-success HTTP status: 5xx and 429 are transient, any
/// other status (the 4xx family) is fatal.
pub fn classify_status(provider: &str, status: u16) -> AttemptFailure {
    let error = Error::FetchStatus {
        provider: provider.to_string(),
        status,
    };
    if status >= 500 || status == 429 {
        AttemptFailure::Transient(error)
    } else {
        AttemptFailure::Fatal(error)
    }
}

/// Runs `operation` under the policy: each attempt is bounded by
/// `policy.timeout`, transient failures are retried with exponential
/// backoff, fatal failures and exhaustion return the underlying error.
pub async fn fetch_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    provider: &'static str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptFailure>>,
{
    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.retry_delay(attempt - 1);
            tracing::debug!(
                provider,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(AttemptFailure::Fatal(e))) => return Err(e),
            Ok(Err(AttemptFailure::Transient(e))) => {
                tracing::debug!(provider, attempt, error = %e, "transient failure, will retry");
                last_error = Some(e);
            }
            Err(elapsed) => {
                tracing::debug!(
                    provider,
                    attempt,
                    timeout_ms = policy.timeout.as_millis() as u64,
                    "request timed out, will retry"
                );
                last_error = Some(Error::fetch(provider, "request timed out", elapsed));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::FetchMessage {
        provider: provider.to_string(),
        message: "no attempts executed".to_string(),
    }))
}
