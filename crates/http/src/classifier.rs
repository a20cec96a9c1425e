//! Deciding which outcomes count as failures.
//!
//! The plain client retries what the classifier marks retryable; the breaker
//! client reports the same outcomes as failures to its circuit breaker.

use reqwest::StatusCode;

use crate::error::{TransportError, TransportErrorKind};

/// Marks responses and transport errors as retryable.
pub trait StatusClassifier: Send + Sync {
    fn is_retryable_status(&self, status: StatusCode) -> bool;

    /// Every transport error except a malformed request is retryable.
    fn is_retryable_error(&self, error: &TransportError) -> bool {
        error.kind() != TransportErrorKind::InvalidRequest
    }
}

/// Retries 5xx responses and recoverable transport errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl StatusClassifier for DefaultClassifier {
    fn is_retryable_status(&self, status: StatusCode) -> bool {
        status.is_server_error()
    }
}

/// Any `Fn(StatusCode) -> bool` works as a status predicate.
impl<F> StatusClassifier for F
where
    F: Fn(StatusCode) -> bool + Send + Sync,
{
    fn is_retryable_status(&self, status: StatusCode) -> bool {
        self(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retries_server_errors_only() {
        let classifier = DefaultClassifier;
        assert!(classifier.is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(classifier.is_retryable_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!classifier.is_retryable_status(StatusCode::OK));
        assert!(!classifier.is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!classifier.is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn test_default_transport_errors() {
        let classifier = DefaultClassifier;
        assert!(classifier.is_retryable_error(&TransportError::connect("refused")));
        assert!(classifier.is_retryable_error(&TransportError::timeout("slow")));
        assert!(!classifier.is_retryable_error(&TransportError::invalid_request("bad")));
    }

    #[test]
    fn test_closure_classifier() {
        let classifier = |status: StatusCode| {
            status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        };
        assert!(classifier.is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!classifier.is_retryable_status(StatusCode::BAD_REQUEST));
    }
}
