//! Bounded retries with exponential backoff.

use crate::error::{Result, SearchError};
use marcanet_core::SearchConfig;
use std::future::Future;
use std::time::Duration;

/// Retry budget for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per operation, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1 << exponent)
    }
}

impl From<&SearchConfig> for RetryPolicy {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base(),
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryFailure {
    /// A failure that retrying cannot fix
    Fatal(SearchError),
    /// Every attempt failed transiently; holds the last error
    Exhausted(SearchError),
}

impl RetryFailure {
    /// The underlying error.
    #[must_use]
    pub fn into_inner(self) -> SearchError {
        match self {
            Self::Fatal(e) | Self::Exhausted(e) => e,
        }
    }
}

/// Runs an operation until it succeeds, fails fatally, or runs out of attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    /// Create a controller using `policy`.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy in effect.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `op`, retrying transient failures with backoff.
    ///
    /// `op` receives the 1-based attempt number. Every attempt made is added
    /// to `attempts`. Fatal errors return at once.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        attempts: &mut u32,
        mut op: F,
    ) -> std::result::Result<T, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            *attempts += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => {
                    tracing::error!("{} failed: {}", label, e);
                    return Err(RetryFailure::Fatal(e));
                }
                Err(e) if attempt >= max => {
                    tracing::warn!("{} failed (attempt {}/{}), giving up: {}", label, attempt, max, e);
                    return Err(RetryFailure::Exhausted(e));
                }
                Err(e) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label,
                        attempt,
                        max,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
