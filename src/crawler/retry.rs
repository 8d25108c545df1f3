//! Retry with exponential backoff around the fetch capability

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, FetchRequest, FetchedDocument, Fetcher};
use crate::crawler::throttle::FetchThrottle;
use std::time::Duration;

/// How many times to attempt a fetch and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_secs(4),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            attempts: config.retry_attempts,
            initial_backoff: Duration::from_millis(config.backoff_initial_ms),
            max_backoff: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay after the `failed_attempt`-th attempt (1-based)
    ///
    /// `initial * 2^(n-1)`, capped at `max_backoff`.
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Fetches a document, retrying transient failures
///
/// Every attempt, retries included, waits on the shared throttle first. Permanent
/// errors are returned immediately; transient ones are returned once the attempt
/// budget is exhausted.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    throttle: &FetchThrottle,
    request: &FetchRequest,
    policy: &RetryPolicy,
) -> Result<FetchedDocument, FetchError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        throttle.acquire().await;

        match fetcher.fetch(request).await {
            Ok(document) => return Ok(document),
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = policy.backoff_for(attempt);
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}. Retrying in {:?}",
                    attempt,
                    attempts,
                    request.url,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
