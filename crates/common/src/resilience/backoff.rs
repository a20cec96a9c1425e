//! Backoff strategies for spacing out retry attempts.
//!
//! A strategy is a pure mapping from a 0-based attempt index to a wait
//! duration. Jitter, when configured, adds a uniformly distributed offset in
//! `[0, jitter]` to every computed wait, so two calls with the same attempt
//! index may return different values.

use std::time::Duration;

use rand::Rng;

use super::error::{ConfigError, ConfigResult};

/// Backoff strategy for calculating retry delays.
#[derive(Debug, Clone, Default)]
pub enum BackoffStrategy {
    /// Retry immediately.
    #[default]
    None,
    /// Fixed interval plus optional jitter.
    Constant { interval: Duration, jitter: Duration },
    /// `initial + increment * attempt`, capped at `max`.
    Linear { initial: Duration, increment: Duration, max: Duration },
    /// `min(initial * factor^attempt, max)` plus optional jitter.
    Exponential { initial: Duration, max: Duration, factor: f64, jitter: Duration },
    /// Caller-supplied function of the attempt index.
    Custom(fn(u32) -> Duration),
}

impl BackoffStrategy {
    /// Fixed interval without jitter.
    pub fn constant(interval: Duration) -> Self {
        Self::Constant { interval, jitter: Duration::ZERO }
    }

    /// Fixed interval with up to `jitter` of random extra wait.
    pub fn constant_with_jitter(interval: Duration, jitter: Duration) -> Self {
        Self::Constant { interval, jitter }
    }

    /// Doubling backoff starting at `initial`, capped at `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self::Exponential { initial, max, factor: 2.0, jitter: Duration::ZERO }
    }

    /// Exponential backoff with an explicit growth factor and jitter bound.
    pub fn exponential_with(initial: Duration, max: Duration, factor: f64, jitter: Duration) -> Self {
        Self::Exponential { initial, max, factor, jitter }
    }

    /// Linear backoff capped at `max`.
    pub fn linear(initial: Duration, increment: Duration, max: Duration) -> Self {
        Self::Linear { initial, increment, max }
    }

    /// Wait before the retry that follows attempt `attempt` (0-based).
    pub fn wait(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant { interval, jitter } => interval.saturating_add(random_jitter(*jitter)),
            Self::Linear { initial, increment, max } => {
                initial.saturating_add(increment.saturating_mul(attempt)).min(*max)
            }
            Self::Exponential { initial, max, factor, jitter } => {
                exponential_delay(*initial, *max, *factor, attempt)
                    .saturating_add(random_jitter(*jitter))
            }
            Self::Custom(f) => f(attempt),
        }
    }

    /// Reject parameter combinations that would break monotonicity.
    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            Self::Exponential { initial, max, factor, .. } => {
                if !factor.is_finite() || *factor < 1.0 {
                    return Err(ConfigError::invalid("exponential factor must be at least 1.0"));
                }
                if initial > max {
                    return Err(ConfigError::invalid(
                        "exponential initial interval must not exceed the maximum interval",
                    ));
                }
                Ok(())
            }
            Self::Linear { initial, max, .. } if initial > max => Err(ConfigError::invalid(
                "linear initial interval must not exceed the maximum interval",
            )),
            _ => Ok(()),
        }
    }
}

impl PartialEq for BackoffStrategy {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (
                Self::Constant { interval: a, jitter: aj },
                Self::Constant { interval: b, jitter: bj },
            ) => a == b && aj == bj,
            (
                Self::Linear { initial: a, increment: ai, max: am },
                Self::Linear { initial: b, increment: bi, max: bm },
            ) => a == b && ai == bi && am == bm,
            (
                Self::Exponential { initial: a, max: am, factor: af, jitter: aj },
                Self::Exponential { initial: b, max: bm, factor: bf, jitter: bj },
            ) => a == b && am == bm && af == bf && aj == bj,
            // function identity is all we can compare
            (Self::Custom(a), Self::Custom(b)) => *a as usize == *b as usize,
            _ => false,
        }
    }
}

fn exponential_delay(initial: Duration, max: Duration, factor: f64, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let scaled = initial.as_secs_f64() * factor.powi(exponent);
    if !scaled.is_finite() {
        return max;
    }
    Duration::try_from_secs_f64(scaled).map_or(max, |delay| delay.min(max))
}

fn random_jitter(bound: Duration) -> Duration {
    if bound.is_zero() {
        return Duration::ZERO;
    }
    let upper = u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(rand::thread_rng().gen_range(0..=upper))
}
