//! Retry policy and the retry loop built on top of it.
//!
//! A [`RetryPolicy`] pairs a [`BackoffStrategy`] with a maximum retry count
//! (`0` means exactly one attempt). A [`Retrier`] answers the two per-attempt
//! questions the loop needs, whether another attempt is allowed and how long
//! to wait first, and [`Retrier::run`] drives an operation through that loop.
//!
//! Backoff waits race the effective deadline (the caller deadline or the
//! policy's `max_total_time`, whichever comes first), and the returned future
//! can be dropped at any point to cancel an in-progress wait.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use super::backoff::BackoffStrategy;
use super::error::{ConfigError, ConfigResult, RetryError, RetryResult};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Wait calculation between attempts.
    pub backoff: BackoffStrategy,
    /// Upper bound on the whole retry sequence, waits included.
    pub max_total_time: Option<Duration>,
}

impl RetryPolicy {
    /// Start a policy builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self::default()
    }

    /// Validate the policy.
    pub fn validate(&self) -> ConfigResult<()> {
        self.backoff.validate()?;
        if self.max_total_time.is_some_and(|limit| limit.is_zero()) {
            return Err(ConfigError::invalid("max_total_time must be greater than zero"));
        }
        Ok(())
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.policy.max_retries = retries;
        self
    }

    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.policy.backoff = backoff;
        self
    }

    pub fn constant_backoff(mut self, interval: Duration, jitter: Duration) -> Self {
        self.policy.backoff = BackoffStrategy::constant_with_jitter(interval, jitter);
        self
    }

    pub fn exponential_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.policy.backoff = BackoffStrategy::exponential(initial, max);
        self
    }

    pub fn max_total_time(mut self, limit: Duration) -> Self {
        self.policy.max_total_time = Some(limit);
        self
    }

    pub fn unlimited_time(mut self) -> Self {
        self.policy.max_total_time = None;
        self
    }

    pub fn build(self) -> ConfigResult<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

/// Classified result of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Final result; stop and return it.
    Done(T),
    /// Failed in a way worth retrying.
    Retryable(E),
    /// Failed in a way retrying cannot fix.
    Fatal(E),
}

/// Per-attempt information handed to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    /// 0-based attempt index.
    pub attempt: u32,
    /// Point in time the whole sequence must finish by, if any.
    pub deadline: Option<Instant>,
}

impl AttemptContext {
    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Decides whether and when to retry.
#[derive(Debug, Clone, Default)]
pub struct Retrier {
    policy: RetryPolicy,
}

impl Retrier {
    /// Build a retrier from a validated policy.
    pub fn new(policy: RetryPolicy) -> ConfigResult<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    /// Retrier that permits exactly one attempt.
    pub fn none() -> Self {
        Self { policy: RetryPolicy::no_retry() }
    }

    /// `true` while `attempt` is below the retry budget.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.policy.max_retries
    }

    /// Wait before the attempt that follows `attempt`.
    pub fn next_wait(&self, attempt: u32) -> Duration {
        self.policy.backoff.wait(attempt)
    }

    pub fn max_retries(&self) -> u32 {
        self.policy.max_retries
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it produces a final result, fails fatally,
    /// exhausts the retry budget or runs past the deadline.
    #[instrument(skip_all, fields(max_retries = self.policy.max_retries))]
    pub async fn run<F, Fut, T, E>(&self, deadline: Option<Instant>, mut operation: F) -> RetryResult<T, E>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: fmt::Debug,
    {
        let started = Instant::now();
        // a limit too large to represent leaves the sequence unbounded
        let total = self.policy.max_total_time.and_then(|limit| started.checked_add(limit));
        let deadline = earliest(deadline, total);
        let mut attempt = 0u32;
        let mut last: Option<E> = None;

        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(attempts = attempt, "retry deadline reached before next attempt");
                return Err(RetryError::DeadlineExceeded {
                    attempts: attempt,
                    elapsed: started.elapsed(),
                    last,
                });
            }

            debug!(attempt = attempt + 1, max_attempts = self.policy.max_retries + 1, "starting attempt");

            match operation(AttemptContext { attempt, deadline }).await {
                Attempt::Done(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation completed after retries");
                    }
                    return Ok(value);
                }
                Attempt::Fatal(error) => {
                    debug!(attempt = attempt + 1, ?error, "non-retryable failure");
                    return Err(RetryError::NonRetryable { attempts: attempt + 1, error });
                }
                Attempt::Retryable(error) => {
                    if !self.should_retry(attempt) {
                        warn!(attempts = attempt + 1, ?error, "retries exhausted");
                        return Err(RetryError::Exhausted { attempts: attempt + 1, last: error });
                    }

                    let wait = self.next_wait(attempt);
                    warn!(attempt = attempt + 1, ?error, ?wait, "attempt failed, backing off");
                    last = Some(error);

                    if !wait_until(wait, deadline).await {
                        warn!(attempts = attempt + 1, "retry deadline reached during backoff");
                        return Err(RetryError::DeadlineExceeded {
                            attempts: attempt + 1,
                            elapsed: started.elapsed(),
                            last,
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl From<RetryPolicy> for Retrier {
    /// Unvalidated conversion; prefer [`Retrier::new`] for caller input.
    fn from(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

/// Sleep for `wait`, cut short by `deadline`. Returns `false` if the
/// deadline arrived first.
async fn wait_until(wait: Duration, deadline: Option<Instant>) -> bool {
    let wake = Instant::now().checked_add(wait);
    match (wake, deadline) {
        (Some(wake), Some(deadline)) if deadline <= wake => {
            tokio::time::sleep_until(deadline.into()).await;
            false
        }
        (None, Some(deadline)) => {
            tokio::time::sleep_until(deadline.into()).await;
            false
        }
        (Some(wake), _) => {
            tokio::time::sleep_until(wake.into()).await;
            true
        }
        (None, None) => {
            tokio::time::sleep(wait).await;
            true
        }
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
