//! Error types shared by the resilience primitives.

use std::time::Duration;

use thiserror::Error;

/// Invalid policy or breaker configuration, reported at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

/// Configuration result type.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Reason a circuit breaker refused to admit a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The breaker is open, or half-open with its probe already in flight.
    #[error("circuit breaker '{command}' is open")]
    CircuitOpen { command: String },

    /// Too many calls for the command are already in flight.
    #[error("circuit breaker '{command}' reached its concurrency limit of {limit}")]
    ConcurrencyLimit { command: String, limit: usize },
}

/// Failure of a generic retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every permitted attempt failed with a retryable error.
    #[error("All retry attempts exhausted after {attempts} tries")]
    Exhausted { attempts: u32, last: E },

    /// The operation failed with an error the caller marked as fatal.
    #[error("Operation failed with non-retryable error after {attempts} tries")]
    NonRetryable { attempts: u32, error: E },

    /// The caller's deadline passed before the operation completed.
    #[error("Retry deadline exceeded after {elapsed:?} ({attempts} tries)")]
    DeadlineExceeded { attempts: u32, elapsed: Duration, last: Option<E> },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::NonRetryable { attempts, .. }
            | Self::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }
}

/// Result of a generic retried operation.
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Failure of an operation run through [`super::CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The breaker refused the call before it ran.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// The operation ran and failed.
    #[error("Operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },

    /// The operation did not finish within the breaker's timeout.
    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages_name_the_command() {
        let open = Rejection::CircuitOpen { command: "orders".into() };
        assert_eq!(open.to_string(), "circuit breaker 'orders' is open");

        let full = Rejection::ConcurrencyLimit { command: "orders".into(), limit: 4 };
        assert!(full.to_string().contains("concurrency limit of 4"));
    }

    #[test]
    fn test_retry_error_reports_attempts() {
        let exhausted = RetryError::Exhausted { attempts: 3, last: "boom" };
        assert_eq!(exhausted.attempts(), 3);
        assert!(exhausted.to_string().contains("3 tries"));

        let deadline = RetryError::<&str>::DeadlineExceeded {
            attempts: 2,
            elapsed: Duration::from_millis(50),
            last: None,
        };
        assert_eq!(deadline.attempts(), 2);
    }
}
