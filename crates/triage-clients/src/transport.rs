//! Shared request loop with retry and backoff.
//!
//! Every adapter sends through [`send_with_retry`]. Rate limiting (429),
//! server errors (5xx) and connect/timeout failures are retried with
//! exponential backoff, honouring `Retry-After` when the service sends one.
//!
//! Requests that create something (Jira issues, summarization jobs) are
//! sent with [`Replay::Unsent`] and only repeat when the server provably
//! did not act on them.

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// Cap on any single backoff sleep.
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Error bodies are cut to this many characters in messages.
const ERROR_BODY_LIMIT: usize = 800;

/// Retry settings shared by all adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: base_delay_ms.max(1),
        }
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self::new(1, 1)
    }
}

/// When a failed request may be sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Reads, polls, token grants and stateless analysis calls.
    Any,
    /// Creates: only after a 429 or a failure to connect, when nothing
    /// reached the server's handler.
    Unsent,
}

impl Replay {
    pub fn allows_status(self, status: u16) -> bool {
        match self {
            Replay::Any => is_retryable_status(status),
            Replay::Unsent => status == 429,
        }
    }

    pub fn allows_error(self, error: &reqwest::Error) -> bool {
        match self {
            Replay::Any => is_retryable_transport_error(error),
            Replay::Unsent => error.is_connect(),
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// `Retry-After` in whole seconds; HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

/// `base * 2^(attempt-1)`, capped, or the server's `Retry-After` if larger
/// than the base delay.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay.max(Duration::from_millis(base_delay_ms));
    }
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled.min(MAX_RETRY_DELAY_MS))
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

/// Send the request built by `request_builder` until it succeeds, the
/// policy gives up, or `replay` forbids another attempt.
///
/// The builder is called once per attempt so that per-request headers
/// (signatures, dates) are fresh. Returns the first 2xx response.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    replay: Replay,
    operation: &str,
    mut request_builder: F,
) -> ClientResult<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0_usize;
    loop {
        attempt = attempt.saturating_add(1);
        match request_builder().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!(operation, attempt, status = status.as_u16(), "request succeeded");
                    return Ok(response);
                }

                let retry_after = parse_retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                if attempt < max_attempts && replay.allows_status(status.as_u16()) {
                    let delay = retry_delay(policy.base_delay_ms, attempt, retry_after);
                    warn!(
                        operation,
                        attempt,
                        status = status.as_u16(),
                        delay_ms = delay.as_millis() as u64,
                        "retrying after server error"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                return Err(ClientError::Status {
                    operation: operation.to_string(),
                    status: status.as_u16(),
                    body: truncate_for_error(&body, ERROR_BODY_LIMIT),
                });
            }
            Err(error) => {
                if attempt < max_attempts && replay.allows_error(&error) {
                    let delay = retry_delay(policy.base_delay_ms, attempt, None);
                    warn!(operation, attempt, error = %error, "retrying after transport error");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(ClientError::Http(format!("{operation} request failed: {error}")));
            }
        }
    }
}

/// Decode a successful response body as JSON.
pub async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &str,
) -> ClientResult<T> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ClientError::Response {
        operation: operation.to_string(),
        detail: format!("{e}: {}", truncate_for_error(&body, ERROR_BODY_LIMIT)),
    })
}
