//! Error taxonomy for transports and clients.
//!
//! Non-2xx responses are not errors: a client returns them as `Ok` unless the
//! retry budget ran out while the classifier still considered them
//! retryable, in which case the last response travels inside
//! [`ClientError::RetriesExhausted`].

use std::fmt;
use std::time::Duration;

use breakwater_common::resilience::{ConfigError, Rejection, RetryError};
use breakwater_common::{ErrorClassification, ErrorSeverity};
use thiserror::Error;

use crate::response::HttpResponse;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad cause of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Could not establish a connection.
    Connect,
    /// The transport's own timeout fired.
    Timeout,
    /// The request failed in flight (reset, protocol error).
    Request,
    /// Reading the response body failed.
    Body,
    /// The request could not be built or sent as given.
    InvalidRequest,
    /// Anything else a custom transport reports.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Request => "request",
            Self::Body => "body",
            Self::InvalidRequest => "invalid request",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Failure below the HTTP layer; always ends the current attempt.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    /// Attach the underlying cause.
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_builder() {
            TransportErrorKind::InvalidRequest
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };

        Self::new(kind, err.to_string()).with_source(err)
    }
}

impl ErrorClassification for TransportError {
    fn is_retryable(&self) -> bool {
        self.kind != TransportErrorKind::InvalidRequest
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            TransportErrorKind::InvalidRequest => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }
}

/// Why a single attempt did not produce a final result.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("attempt timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The server answered, but with a status the classifier retries.
    #[error("server responded with status {}", .0.status())]
    Status(HttpResponse),
}

impl AttemptFailure {
    /// The response carried by a status failure.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Status(response) => Some(response),
            _ => None,
        }
    }

    /// Take the response out of a status failure.
    pub fn into_response(self) -> Option<HttpResponse> {
        match self {
            Self::Status(response) => Some(response),
            _ => None,
        }
    }
}

/// Errors returned by [`crate::HttpClient`] and [`crate::CircuitBreakerClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// A transport failure that was not retried.
    #[error("transport failure")]
    Transport(#[from] TransportError),

    /// The single attempt of a breaker-guarded call ran out of time.
    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The retry budget is spent; `last` is the final attempt's failure.
    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: AttemptFailure,
    },

    #[error("circuit breaker '{command}' is open")]
    CircuitOpen { command: String },

    #[error("circuit breaker '{command}' reached its concurrency limit of {limit}")]
    ConcurrencyLimit { command: String, limit: usize },

    /// The caller's deadline or the policy's total time limit passed.
    #[error("deadline exceeded after {attempts} attempts ({elapsed:?})")]
    DeadlineExceeded { attempts: u32, elapsed: Duration, last: Option<AttemptFailure> },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Last response seen before giving up, when the final failure was a
    /// retryable status.
    pub fn last_response(&self) -> Option<&HttpResponse> {
        match self {
            Self::RetriesExhausted { last, .. } => last.response(),
            Self::DeadlineExceeded { last: Some(last), .. } => last.response(),
            _ => None,
        }
    }

    /// `true` when the call was refused before reaching the transport.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::ConcurrencyLimit { .. })
    }
}

impl From<Rejection> for ClientError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::CircuitOpen { command } => Self::CircuitOpen { command },
            Rejection::ConcurrencyLimit { command, limit } => {
                Self::ConcurrencyLimit { command, limit }
            }
        }
    }
}

impl From<RetryError<AttemptFailure>> for ClientError {
    fn from(error: RetryError<AttemptFailure>) -> Self {
        match error {
            RetryError::Exhausted { attempts, last } => Self::RetriesExhausted { attempts, last },
            RetryError::NonRetryable { error: AttemptFailure::Transport(err), .. } => {
                Self::Transport(err)
            }
            RetryError::NonRetryable { attempts, error } => {
                Self::RetriesExhausted { attempts, last: error }
            }
            RetryError::DeadlineExceeded { attempts, elapsed, last } => {
                Self::DeadlineExceeded { attempts, elapsed, last }
            }
        }
    }
}

impl ErrorClassification for ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Timeout { .. }
            | Self::RetriesExhausted { .. }
            | Self::CircuitOpen { .. }
            | Self::ConcurrencyLimit { .. }
            | Self::DeadlineExceeded { .. } => true,
            Self::Config(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Transport(err) => err.severity(),
            Self::CircuitOpen { .. } | Self::ConcurrencyLimit { .. } | Self::Timeout { .. } => {
                ErrorSeverity::Warning
            }
            Self::RetriesExhausted { .. } | Self::DeadlineExceeded { .. } | Self::Config(_) => {
                ErrorSeverity::Error
            }
        }
    }
}
