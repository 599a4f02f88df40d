//! Bounded retry for calls to remote execution APIs.
//!
//! Only a fixed set of transient statuses is retried, and never past the
//! attempt cap. Between attempts the server's `Retry-After` hint wins; without
//! one the delay doubles from the base delay up to the cap, with a little
//! random jitter so concurrent test-case requests do not retry in lockstep.
//! Transport errors are not retried.

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Upper bound applied to server supplied `Retry-After` hints.
    #[serde(default = "default_max_retry_after_secs")]
    pub max_retry_after_secs: u64,
}

/// Hard cap on attempts per request, the first one included.
pub const MAX_ATTEMPTS: u32 = 3;

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_jitter_ms() -> u64 {
    250
}

fn default_max_retry_after_secs() -> u64 {
    10
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retry_after_secs: default_max_retry_after_secs(),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(status: StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }

    /// Computed backoff before retry number `retry` (1 for the first retry),
    /// without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(20);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_ms))
    }

    /// Attempts actually made per request.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.clamp(1, MAX_ATTEMPTS)
    }

    /// Longest time one request can spend in [`send_with_retry`] when every
    /// attempt runs into `request_timeout` and every wait is at its cap.
    pub fn worst_case_duration(&self, request_timeout: Duration) -> Duration {
        let attempts = self.attempts();
        let longest_hint = Duration::from_secs(self.max_retry_after_secs);
        let waits: Duration = (1..attempts)
            .map(|retry| {
                let backoff = self.backoff(retry) + Duration::from_millis(self.jitter_ms);
                backoff.max(longest_hint)
            })
            .sum();
        request_timeout * attempts + waits
    }

    /// Delay before retry number `retry`, preferring a parseable hint.
    pub fn delay_for(&self, retry: u32, retry_after: Option<&str>) -> Duration {
        match retry_after.and_then(|value| parse_retry_after(value, Utc::now())) {
            Some(hint) => hint.min(Duration::from_secs(self.max_retry_after_secs)),
            None => self.backoff(retry) + self.jitter(),
        }
    }
}

/// Parses a `Retry-After` value given either as delta seconds or as an HTTP
/// date. Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(Duration::from_secs_f64(seconds));
        }
        return None;
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Sends the request built by `build` until it yields a non-retryable status
/// or the attempt cap is reached, and returns the last response either way.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    backend: &str,
    mut build: F,
) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> RequestBuilder,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        log::debug!("{} request attempt {}/{}", backend, attempt, max_attempts);
        let response = build().send().await?;
        let status = response.status();

        if !RetryPolicy::is_retryable(status) || attempt >= max_attempts {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok());
        let delay = policy.delay_for(attempt, retry_after);
        log::warn!(
            "{} returned {} (attempt {}/{}), retrying in {:?}",
            backend,
            status,
            attempt,
            max_attempts,
            delay
        );

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
