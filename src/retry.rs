//! Retry mechanisms for AWS client calls.
//!
//! This module provides:
//! - Exponential backoff with a configurable multiplier and delay cap
//! - Full jitter to prevent thundering herd
//! - Transient error classification, so only retryable failures are retried
//! - [`Retrying`], a decorator composed around a raw client at construction time
//!
//! # Example
//!
//! ```rust,ignore
//! use rustible_aws::retry::{Retrying, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::jittered_backoff(10, Duration::from_secs(3), Duration::from_secs(30));
//! let client = Retrying::new(raw_client, policy);
//! ```

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for calculating delay between retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,

    /// Exponential backoff: delay = initial_delay * multiplier^attempt
    Exponential {
        /// Multiplier for exponential growth
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn calculate_delay(&self, attempt: u32, initial_delay: Duration) -> Duration {
        let base_millis = initial_delay.as_millis() as f64;

        let delay_millis = match self {
            Self::Constant => base_millis,
            Self::Exponential { multiplier } => base_millis * multiplier.powf(f64::from(attempt)),
        };

        // Large attempt counts overflow f64 -> u64; saturate instead.
        if delay_millis >= u64::MAX as f64 {
            Duration::from_millis(u64::MAX)
        } else {
            Duration::from_millis(delay_millis as u64)
        }
    }
}

/// Jitter strategy for adding randomness to delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// No jitter - use exact calculated delay.
    None,

    /// Full jitter: random value between 0 and calculated delay.
    Full,
}

impl JitterStrategy {
    /// Apply jitter to a calculated delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let delay_millis = delay.as_millis() as f64;

        let jittered_millis = match self {
            Self::None => delay_millis,
            Self::Full => {
                if delay_millis > 0.0 {
                    rand::rng().random_range(0.0..delay_millis)
                } else {
                    0.0
                }
            }
        };

        Duration::from_millis(jittered_millis.max(0.0) as u64)
    }
}

/// Helper trait for transient error classification.
pub trait TransientError {
    /// Returns true if this error is transient and should be retried.
    fn is_transient(&self) -> bool;
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 means no retries, just the initial attempt).
    pub max_retries: u32,

    /// Initial delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (caps exponential growth).
    pub max_delay: Duration,

    /// Backoff strategy for calculating delays.
    pub backoff: BackoffStrategy,

    /// Jitter strategy for adding randomness.
    pub jitter: JitterStrategy,
}

impl RetryPolicy {
    /// Create a policy with simple constant delay retries.
    pub fn constant(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
        }
    }

    /// Exponential backoff with full jitter, capped at `max_delay`.
    pub fn jittered_backoff(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff: BackoffStrategy::Exponential { multiplier: 2.0 },
            jitter: JitterStrategy::Full,
        }
    }

    /// Calculate the delay for a given attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.backoff.calculate_delay(attempt, self.initial_delay);
        let capped_delay = base_delay.min(self.max_delay);
        self.jitter.apply(capped_delay)
    }

    /// Check if retrying should continue based on attempt count.
    pub fn should_continue(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Execute an async operation, retrying transient failures.
    ///
    /// Non-transient errors are returned immediately. When retries are
    /// exhausted the last error is returned unmodified.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TransientError + std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            debug!("Attempt {} of {}", attempt + 1, self.max_retries + 1);

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retry attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !e.is_transient() {
                        return Err(e);
                    }

                    warn!("Attempt {} failed: {}", attempt + 1, e);

                    if !self.should_continue(attempt) {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    debug!("Waiting {:?} before retry", delay);
                    tokio::time::sleep(delay).await;

                    attempt += 1;
                }
            }
        }
    }
}

/// A client wrapped with a retry policy.
///
/// Capability traits are implemented for `Retrying<C>` wherever `C`
/// implements them, so callers see the same interface as the raw client.
#[derive(Debug, Clone)]
pub struct Retrying<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> Retrying<C> {
    /// Wrap `inner` so every call goes through `policy`.
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// The policy applied to each call.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
