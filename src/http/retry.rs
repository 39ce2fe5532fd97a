//! Retry and backoff policy
//!
//! A [`RetryPolicy`] wraps one logical HTTP call. It holds no mutable state,
//! so a single value is cloned into every worker.

use super::client::HttpResponse;
use crate::config::EngineSettings;
use crate::error::{classify_status, Error, ErrorClass, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Bounded retries with backoff for retryable failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for any delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

impl RetryPolicy {
    /// Create an exponential policy
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    /// Build the policy from engine settings
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(
            settings.max_retries,
            Duration::from_millis(settings.initial_backoff_ms),
            Duration::from_millis(settings.max_backoff_ms),
        )
    }

    /// Delay before retry `attempt`: doubles from the initial backoff, capped
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        std::cmp::min(delay, self.max_backoff)
    }

    /// Run `op` until it yields a 2xx response or a non-retryable outcome.
    ///
    /// Only the successful attempt's response is returned. Resource-missing
    /// statuses become [`Error::ResourceMissing`], other terminal statuses
    /// become [`Error::HttpStatus`], and exhausting the retries yields
    /// [`Error::MaxRetriesExceeded`].
    pub async fn execute<F, Fut>(&self, url: &str, mut op: F) -> Result<HttpResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpResponse>>,
    {
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            let delay = match op().await {
                Ok(response) => match classify_status(response.status) {
                    None => return Ok(response),
                    Some(ErrorClass::ResourceMissing) => {
                        return Err(Error::resource_missing(response.status, url));
                    }
                    Some(ErrorClass::Fatal) => {
                        return Err(Error::http_status(
                            response.status,
                            url,
                            truncate_body(&response.body),
                        ));
                    }
                    Some(ErrorClass::Retryable) => {
                        last_error = format!("HTTP {}", response.status);
                        match response.retry_after() {
                            Some(after) if response.status == 429 => after.min(self.max_backoff),
                            _ => self.calculate_backoff(attempt),
                        }
                    }
                },
                Err(e) if e.is_retryable() => {
                    last_error = e.to_string();
                    self.calculate_backoff(attempt)
                }
                Err(e) => return Err(e),
            };

            if attempt < self.max_retries {
                warn!(
                    url,
                    attempt = attempt + 1,
                    max_attempts = self.max_retries + 1,
                    error = %last_error,
                    "Retryable failure, backing off for {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(Error::MaxRetriesExceeded {
            max_retries: self.max_retries,
            url: url.to_string(),
            last_error,
        })
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
