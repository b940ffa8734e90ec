//! Reconnect-and-retry-once policy for remote calls.
//!
//! Remote mutations are retried exactly once, and only when the failure is
//! transient (timeout, dropped connection, upstream 502). Before the retry
//! the caller's reset hook runs so the second attempt goes out on a fresh
//! connection pool.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

/// Delay before the single retry of a transient failure, in milliseconds.
pub const TRANSIENT_RETRY_DELAY_MS: u64 = 250;

/// Number of retries granted to a transient failure.
pub const MAX_TRANSIENT_RETRIES: usize = 1;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay between the failed attempt and the retry.
    pub delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(TRANSIENT_RETRY_DELAY_MS),
            max_retries: MAX_TRANSIENT_RETRIES,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(delay: Duration, max_retries: usize) -> Self {
        Self { delay, max_retries }
    }

    /// A configuration that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    /// Build a constant backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_retries)
    }
}

/// Execute an operation, retrying it once after a transient failure.
///
/// - `is_transient` decides whether an error qualifies for the retry.
/// - `on_transient` runs before the retry is issued (e.g. to reset the
///   client's transport); it is never called for fatal errors.
/// - `label` identifies the call in logs.
///
/// The error of the last attempt is returned if every attempt fails.
///
/// # Example
///
/// ```ignore
/// let page = with_transient_retry(
///     || async { client.create_page(&body).await },
///     &RetryConfig::default(),
///     PlatformError::is_transient,
///     |_| client.reset(),
///     "insert owner/repo",
/// ).await?;
/// ```
pub async fn with_transient_retry<T, E, F, Fut, IsTransient, OnTransient>(
    mut operation: F,
    config: &RetryConfig,
    is_transient: IsTransient,
    mut on_transient: OnTransient,
    label: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error,
    IsTransient: Fn(&E) -> bool,
    OnTransient: FnMut(&E),
{
    // Track attempt number for logging
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.clone().into_backoff())
        .when(|e| is_transient(e))
        .notify(|err, dur| {
            tracing::warn!(
                call = label,
                attempt = attempt.load(Ordering::SeqCst),
                retry_in = ?dur,
                error = %err,
                "Transient failure, resetting connection and retrying"
            );
            on_transient(err);
        })
        .await
}
