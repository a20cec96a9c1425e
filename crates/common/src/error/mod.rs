//! Error classification shared by every breakwater error type.
//!
//! Errors that cross a crate boundary implement [`ErrorClassification`] so
//! callers can make retry and alerting decisions without matching on
//! concrete variants:
//!
//! - **`is_retryable()`**: can the same request succeed if sent again?
//! - **`severity()`**: how loudly should this be reported?
//! - **`is_critical()`**: does this require immediate attention?
//! - **`retry_after()`**: suggested delay before retrying, when known
//!
//! ```rust,ignore
//! use breakwater_common::error::{ErrorClassification, ErrorSeverity};
//!
//! fn report(err: &impl ErrorClassification) {
//!     if err.severity() >= ErrorSeverity::Error {
//!         // page someone
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard classification interface for errors.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: connection resets, timeouts, an
    /// overloaded upstream, or a circuit that may close again.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the error itself carries a recommended
    /// delay, or `None` if no specific delay is suggested. None of the
    /// breakwater errors carry one; callers fall back to their backoff.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl ErrorClassification for crate::resilience::ConfigError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}

impl ErrorClassification for crate::resilience::Rejection {
    fn is_retryable(&self) -> bool {
        true
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Warning
    }
}
