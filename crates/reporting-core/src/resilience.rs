//! Retry logic for external calls.
//!
//! Directory binds, CRM session establishment and store connections all go
//! through [`RetryExecutor`], which retries transient failures with bounded
//! exponential backoff and hands the last error back on exhaustion.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Classification of an error as worth retrying.
///
/// Implemented by every error type that crosses an external boundary so the
/// executor can stay generic over them.
pub trait Transient {
    /// Returns true if the failure may resolve itself on a later attempt.
    fn is_transient(&self) -> bool;
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first call.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A configuration that calls the operation exactly once.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Override the number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Override the initial and maximum delays.
    #[must_use]
    pub fn with_delays(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self
    }
}

/// Retry executor with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryExecutor {
    /// Create a new retry executor with the given configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calculate the wait after a failed attempt (0-indexed).
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_multiplier.powi(attempt as i32);

        let delay_ms = base_delay.min(self.config.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Execute an operation, retrying transient failures.
    ///
    /// Permanent errors return immediately. After the last attempt the most
    /// recent error is returned to the caller.
    pub async fn execute<F, Fut, T, E>(&self, what: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    if !e.is_transient() {
                        return Err(e);
                    }
                    if attempt >= max_attempts {
                        warn!(
                            operation = what,
                            attempts = attempt,
                            error = %e,
                            "Giving up after transient errors"
                        );
                        return Err(e);
                    }

                    let delay = self.calculate_delay(attempt - 1);
                    debug!(
                        operation = what,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("unavailable")]
        Unavailable,
        #[error("bad credentials")]
        BadCredentials,
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Unavailable)
        }
    }

    fn fast_config() -> RetryConfig {
        RetryConfig::default().with_delays(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let executor = RetryExecutor::default();
        let calls = AtomicUsize::new(0);

        let result = executor
            .execute("noop", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, TestError>(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let executor = RetryExecutor::new(fast_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = executor
            .execute("flaky", move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError::Unavailable)
                    } else {
                        Ok("bound")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "bound");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let executor = RetryExecutor::new(fast_config());
        let calls = AtomicUsize::new(0);

        let result: Result<(), TestError> = executor
            .execute("down", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Unavailable) }
            })
            .await;

        assert!(matches!(result, Err(TestError::Unavailable)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let executor = RetryExecutor::new(fast_config());
        let calls = AtomicUsize::new(0);

        let result: Result<(), TestError> = executor
            .execute("bind", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::BadCredentials) }
            })
            .await;

        assert!(matches!(result, Err(TestError::BadCredentials)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_backoff_schedule() {
        let executor = RetryExecutor::default();

        assert_eq!(executor.calculate_delay(0), Duration::from_millis(500));
        assert_eq!(executor.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(executor.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(executor.calculate_delay(3), Duration::from_millis(4000));
        assert_eq!(executor.calculate_delay(4), Duration::from_secs(5));
        assert_eq!(executor.calculate_delay(9), Duration::from_secs(5));
    }

    #[test]
    fn test_disabled_makes_single_attempt() {
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
        assert_eq!(RetryConfig::default().with_max_attempts(0).max_attempts, 1);
    }
}
