//! Transport-agnostic resilience primitives.
//!
//! - **Backoff**: attempt index to wait duration ([`BackoffStrategy`])
//! - **Retry**: a retry count plus backoff ([`RetryPolicy`]) and the loop that
//!   applies it ([`Retrier`])
//! - **Circuit Breaker**: per-command state machine with concurrency
//!   admission ([`CircuitBreaker`]), shared by name through a
//!   [`BreakerRegistry`]
//!
//! Time-dependent pieces read time through [`Clock`], so tests drive them with
//! [`MockClock`] instead of sleeping.
//!
//! Nothing here knows about HTTP; the `breakwater` crate composes these
//! primitives around its transport.

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod registry;
pub mod retry;
pub mod window;

pub use backoff::BackoffStrategy;
pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerMetrics, CircuitState, MAX_ROLLING_BUCKETS,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{BreakerError, ConfigError, ConfigResult, Rejection, RetryError, RetryResult};
pub use registry::BreakerRegistry;
pub use retry::{Attempt, AttemptContext, Retrier, RetryPolicy, RetryPolicyBuilder};
pub use window::{RollingWindow, WindowTotals};
