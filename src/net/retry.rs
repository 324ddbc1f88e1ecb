//! Retryable operations with a fixed delay
//!
//! Downstream connects retry forever; listener binds retry a bounded number
//! of times. Both go through [`retry_if`] so the loop lives in one place and
//! observes shutdown.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Delay between downstream connect attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Retry policy: fixed delay, optionally bounded attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; `None` retries forever
    pub max_attempts: Option<u32>,
    /// Sleep between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retry forever with `delay` between attempts
    #[must_use]
    pub const fn forever(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    /// At most `attempts` tries with `delay` between them
    #[must_use]
    pub const fn bounded(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(attempts),
            delay,
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed
    #[must_use]
    pub fn allows_another(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::forever(DEFAULT_RECONNECT_DELAY)
    }
}

/// Run `op` until it succeeds, retrying every error
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or
/// [`Error::Cancelled`] if `cancel` fires first
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_if(policy, cancel, label, |_| true, op).await
}

/// Run `op` until it succeeds, retrying only errors accepted by `should_retry`
///
/// `op` receives the 1-based attempt number.
///
/// # Errors
///
/// Returns the first non-retryable error, the last error once attempts are
/// exhausted, or [`Error::Cancelled`] if `cancel` fires first
pub async fn retry_if<T, F, Fut, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    should_retry: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !should_retry(&err) || !policy.allows_another(attempt) {
            return Err(err);
        }

        tracing::warn!(
            label,
            attempt,
            max_attempts = ?policy.max_attempts,
            delay_ms = u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "attempt failed, retrying"
        );

        tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            () = tokio::time::sleep(policy.delay) => {}
        }
        attempt += 1;
    }
}
