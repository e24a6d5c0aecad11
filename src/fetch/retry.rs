use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// An [`HttpClient`] wrapper that re-sends a request when the server answers
/// `429 Too Many Requests`.
///
/// Waits `base_delay * 2^n` before the n-th retry. Once `max_attempts` is
/// used up the last 429 response is returned as-is for the caller to classify.
pub struct RetryOn429<C> {
    inner: C,
    max_attempts: u32,
    base_delay: Duration,
}

impl<C> RetryOn429<C> {
    pub fn new(inner: C) -> Self {
        Self::with_policy(inner, DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }

    pub fn with_policy(inner: C, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for RetryOn429<C> {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let mut attempt = 0;
        let mut pending = req;

        loop {
            // Streaming bodies cannot be cloned; such requests get one attempt.
            let retry_copy = pending.try_clone();
            let response = self.inner.execute(pending).await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let next = match retry_copy {
                Some(next) if attempt + 1 < self.max_attempts => next,
                _ => return Ok(response),
            };

            let delay = self.backoff(attempt);
            warn!(
                url = %next.url(),
                attempt = attempt + 1,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(delay).await;

            attempt += 1;
            pending = next;
        }
    }
}
