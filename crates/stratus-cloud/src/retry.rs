//! Retry policy with exponential backoff
//!
//! Both blocking loops in the CPI (resource waits and registry calls) are
//! expressed as a [`RetryPolicy`] passed to [`retry`] together with the
//! operation and a predicate deciding which failures are worth retrying.

use crate::checkpoint::TaskCheckpoint;
use crate::error::CloudError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Lower bound of every backoff delay, in seconds
pub const MIN_DELAY_SECS: u64 = 2;

/// How long to sleep after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `2^min(attempt, max_exponent)` seconds: 2, 4, 8, ... capped
    Exponential { max_exponent: u32 },
    /// Uniformly random in `[2, 2^min(attempt, max_exponent)]` seconds, redrawn every attempt
    Jittered { max_exponent: u32 },
}

impl Backoff {
    /// Upper bound of the delay after attempt `attempt` (1-based)
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let max_exponent = match self {
            Backoff::Exponential { max_exponent } | Backoff::Jittered { max_exponent } => {
                *max_exponent
            }
        };
        let exponent = attempt.min(max_exponent).min(62);
        Duration::from_secs((1u64 << exponent).max(MIN_DELAY_SECS))
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt).as_secs();
        match self {
            Backoff::Exponential { .. } => Duration::from_secs(ceiling),
            Backoff::Jittered { .. } => {
                Duration::from_secs(rand::thread_rng().gen_range(MIN_DELAY_SECS..=ceiling))
            }
        }
    }
}

/// Retry budget and backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const DEFAULT_WAIT_MAX_TRIES: u32 = 100;
    pub const DEFAULT_MAX_SLEEP_EXPONENT: u32 = 3;
    pub const REGISTRY_MAX_TRIES: u32 = 3;

    /// Policy for polling provider resources: 100 tries, jittered 2..8s
    pub fn resource_wait() -> Self {
        Self {
            max_attempts: Self::DEFAULT_WAIT_MAX_TRIES,
            backoff: Backoff::Jittered {
                max_exponent: Self::DEFAULT_MAX_SLEEP_EXPONENT,
            },
        }
    }

    /// Policy for registry calls: 3 tries, 2, 4, 8s
    pub fn registry() -> Self {
        Self {
            max_attempts: Self::REGISTRY_MAX_TRIES,
            backoff: Backoff::Exponential {
                max_exponent: Self::DEFAULT_MAX_SLEEP_EXPONENT,
            },
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_max_sleep_exponent(mut self, max_exponent: u32) -> Self {
        self.backoff = match self.backoff {
            Backoff::Exponential { .. } => Backoff::Exponential { max_exponent },
            Backoff::Jittered { .. } => Backoff::Jittered { max_exponent },
        };
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::resource_wait()
    }
}

/// Why [`retry`] gave up
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The task checkpoint aborted the loop
    Cancelled(CloudError),
    /// The operation failed with a non-retryable error
    Fatal(E),
    /// Every attempt failed with a retryable error
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: E,
    },
}

/// Run `operation` until it succeeds, fails fatally, or the budget runs out.
///
/// The checkpoint is consulted before every attempt. The operation receives
/// the 1-based attempt number.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    checkpoint: &TaskCheckpoint,
    is_retryable: P,
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let started_at = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        checkpoint.check().map_err(RetryFailure::Cancelled)?;

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(RetryFailure::Fatal(err)),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(RetryFailure::Exhausted {
                        attempts: attempt,
                        elapsed: started_at.elapsed(),
                        last: err,
                    });
                }

                let delay = policy.backoff.delay_for_attempt(attempt);
                tracing::debug!(
                    "{}; retrying in {} seconds ({}/{})",
                    err,
                    delay.as_secs(),
                    attempt,
                    max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
