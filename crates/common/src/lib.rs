//! Resilience core shared by the breakwater HTTP clients.
//!
//! # Feature Tiers
//!
//! - default: errors, backoff, retry, circuit breaker, breaker registry
//! - `observability`: [`observability::init_tracing`] subscriber helper

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod resilience;
pub mod utils;

#[cfg(feature = "observability")]
pub mod observability;

pub use error::{ErrorClassification, ErrorSeverity};
pub use resilience::{
    BackoffStrategy, BreakerRegistry, CallPermit, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitState, Clock, ConfigError,
    ConfigResult, MockClock, Rejection, Retrier, RetryPolicy, RetryPolicyBuilder, SystemClock,
};
pub use utils::serde::{duration_millis, optional_duration_millis};
