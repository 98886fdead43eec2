//! Bounded-retry page loading.

use crate::config::ScanConfig;
use crate::driver::{DriverSession, NavigationTimeout};
use crate::error::{AttemptFailure, NavigationFailure};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a page load is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Timeout for each attempt.
    pub timeout: Duration,
    /// Total attempts; never less than one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
    /// Pause after a successful load before evidence is read.
    pub settle: Duration,
}

impl RetryPolicy {
    /// Policy for the entry page.
    pub fn entry(config: &ScanConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
            settle: Duration::from_millis(config.settle_delay_ms),
        }
    }

    /// One attempt, no backoff. Used for sub-pages.
    pub fn single(timeout_ms: u64, settle_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            max_attempts: 1,
            backoff: Duration::ZERO,
            settle: Duration::from_millis(settle_ms),
        }
    }
}

/// A successful page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    pub requested_url: String,
    pub final_url: String,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    pub load_time_ms: u64,
}

/// Load `url`, retrying on timeout or transport error.
///
/// Returns a typed failure once every attempt is spent; never panics and
/// never retries past `policy.max_attempts`.
pub async fn navigate(
    session: &mut dyn DriverSession,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Navigation, NavigationFailure> {
    let max_attempts = policy.max_attempts.max(1);
    let timeout_ms = policy.timeout.as_millis() as u64;
    let mut last = (AttemptFailure::Transport, String::from("no attempt made"));

    for attempt in 1..=max_attempts {
        tracing::debug!("navigating to {url} (attempt {attempt}/{max_attempts})");

        // The driver enforces the timeout too; this bounds drivers that don't.
        let outcome = tokio::time::timeout(policy.timeout, session.navigate(url, timeout_ms)).await;

        match outcome {
            Ok(Ok(result)) => {
                if !policy.settle.is_zero() {
                    tokio::time::sleep(policy.settle).await;
                }
                tracing::info!(
                    "loaded {url} → {} in {}ms (attempt {attempt})",
                    result.final_url,
                    result.load_time_ms
                );
                return Ok(Navigation {
                    requested_url: url.to_string(),
                    final_url: result.final_url,
                    attempts: attempt,
                    load_time_ms: result.load_time_ms,
                });
            }
            Ok(Err(e)) => {
                let message = format!("{e:#}");
                let kind = if e.is::<NavigationTimeout>() {
                    AttemptFailure::Timeout
                } else {
                    AttemptFailure::Transport
                };
                tracing::warn!("attempt {attempt} for {url} failed: {message}");
                last = (kind, message);
            }
            Err(_) => {
                tracing::warn!("attempt {attempt} for {url} timed out after {timeout_ms}ms");
                last = (
                    AttemptFailure::Timeout,
                    format!("navigation timed out after {timeout_ms}ms"),
                );
            }
        }

        if attempt < max_attempts && !policy.backoff.is_zero() {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Err(NavigationFailure {
        url: url.to_string(),
        attempts: max_attempts,
        kind: last.0,
        last_error: last.1,
    })
}
