//! Circuit breaker for protecting a single logical backend command.
//!
//! # States
//! - Closed: calls pass through and their outcomes feed a rolling window
//! - Open: calls are rejected without running
//! - Half-Open: exactly one probe call is admitted to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: window volume >= request_volume_threshold
//!                AND error percentage >= error_percent_threshold
//! Open → Half-Open: sleep_window elapsed since the circuit opened
//!                   (evaluated on the next admission attempt)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! Independently of the state machine, a call is rejected when the number of
//! in-flight calls already equals `max_concurrent_requests`.
//!
//! Every admitted call holds a [`CallPermit`]. The permit reports its outcome
//! exactly once; a permit dropped without an explicit report counts as a
//! failure, so an abandoned probe re-opens the circuit instead of wedging it
//! in Half-Open.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use super::error::{BreakerError, ConfigError, ConfigResult, Rejection};
use super::window::{RollingWindow, WindowTotals};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, admitting a single probe
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Upper bound on [`CircuitBreakerConfig::rolling_buckets`].
pub const MAX_ROLLING_BUCKETS: u32 = 1_000;

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Deadline for each admitted call
    pub timeout: Duration,
    /// In-flight calls allowed at once
    pub max_concurrent_requests: usize,
    /// Failure percentage (0-100) at which the circuit opens
    pub error_percent_threshold: u8,
    /// Time the circuit stays open before admitting a probe
    pub sleep_window: Duration,
    /// Calls the window must hold before the error percentage is evaluated
    pub request_volume_threshold: u64,
    /// Length of the rolling outcome window
    pub rolling_window: Duration,
    /// Buckets the rolling window is split into
    pub rolling_buckets: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            max_concurrent_requests: 10,
            error_percent_threshold: 50,
            sleep_window: Duration::from_secs(5),
            request_volume_threshold: 20,
            rolling_window: Duration::from_secs(10),
            rolling_buckets: 10,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.error_percent_threshold > 100 {
            return Err(ConfigError::invalid("error_percent_threshold must be within 0..=100"));
        }

        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid("max_concurrent_requests must be greater than 0"));
        }

        if self.sleep_window.is_zero() {
            return Err(ConfigError::invalid("sleep_window must be greater than 0"));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout must be greater than 0"));
        }

        if self.rolling_window.is_zero() {
            return Err(ConfigError::invalid("rolling_window must be greater than 0"));
        }

        if self.rolling_buckets == 0 || self.rolling_buckets > MAX_ROLLING_BUCKETS {
            return Err(ConfigError::invalid(format!(
                "rolling_buckets must be within 1..={MAX_ROLLING_BUCKETS}"
            )));
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_concurrent_requests(mut self, max: usize) -> Self {
        self.config.max_concurrent_requests = max;
        self
    }

    pub fn error_percent_threshold(mut self, threshold: u8) -> Self {
        self.config.error_percent_threshold = threshold;
        self
    }

    pub fn sleep_window(mut self, window: Duration) -> Self {
        self.config.sleep_window = window;
        self
    }

    pub fn request_volume_threshold(mut self, volume: u64) -> Self {
        self.config.request_volume_threshold = volume;
        self
    }

    pub fn rolling_window(mut self, window: Duration, buckets: u32) -> Self {
        self.config.rolling_window = window;
        self.config.rolling_buckets = buckets;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub in_flight: usize,
    pub window: WindowTotals,
    pub admitted_calls: u64,
    pub rejected_calls: u64,
    pub opened_at: Option<Instant>,
    pub state_change_time: Instant,
}

#[derive(Debug)]
struct BreakerState {
    circuit: CircuitState,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    window: RollingWindow,
    state_change_time: Instant,
    /// Bumped on every transition; a probe only settles the cycle it was
    /// admitted in.
    generation: u64,
}

impl BreakerState {
    fn transition(&mut self, to: CircuitState, now: Instant) {
        self.circuit = to;
        self.state_change_time = now;
        self.generation = self.generation.wrapping_add(1);
        self.opened_at = (to == CircuitState::Open).then_some(now);
        if to != CircuitState::HalfOpen {
            self.probe_in_flight = false;
        }
    }
}

/// Circuit breaker guarding one command.
///
/// All state lives behind one mutex so admission and outcome reporting never
/// observe a torn state; the in-flight counter is atomic and reserved while
/// that mutex is held.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    in_flight: AtomicUsize,
    admitted_calls: AtomicU64,
    rejected_calls: AtomicU64,
    clock: C,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight.load(Ordering::Acquire))
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker on the system clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker with a custom clock (useful for testing)
    pub fn with_clock(name: impl Into<String>, config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        let now = clock.now();
        Ok(Self {
            name: name.into(),
            state: Mutex::new(BreakerState {
                circuit: CircuitState::Closed,
                opened_at: None,
                probe_in_flight: false,
                window: RollingWindow::new(config.rolling_window, config.rolling_buckets),
                state_change_time: now,
                generation: 0,
            }),
            config,
            in_flight: AtomicUsize::new(0),
            admitted_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
            clock,
        })
    }

    /// Command name this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Ask for permission to run one call.
    ///
    /// Rejections happen before the call runs and are not recorded in the
    /// rolling window.
    pub fn try_acquire(&self) -> Result<CallPermit<'_, C>, Rejection> {
        let mut state = self.lock_state();
        let now = self.clock.now();

        if state.circuit == CircuitState::Open {
            let sleep_elapsed = state
                .opened_at
                .is_some_and(|opened| now.saturating_duration_since(opened) >= self.config.sleep_window);
            if !sleep_elapsed {
                return Err(self.reject_open());
            }
            debug!(command = %self.name, "sleep window elapsed, circuit half-open");
            state.transition(CircuitState::HalfOpen, now);
        }

        let probe = state.circuit == CircuitState::HalfOpen;
        if probe && state.probe_in_flight {
            return Err(self.reject_open());
        }

        let reserved = self.in_flight.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            (current < self.config.max_concurrent_requests).then_some(current + 1)
        });
        if reserved.is_err() {
            self.rejected_calls.fetch_add(1, Ordering::Relaxed);
            debug!(command = %self.name, limit = self.config.max_concurrent_requests, "concurrency limit reached");
            return Err(Rejection::ConcurrencyLimit {
                command: self.name.clone(),
                limit: self.config.max_concurrent_requests,
            });
        }

        if probe {
            state.probe_in_flight = true;
        }
        self.admitted_calls.fetch_add(1, Ordering::Relaxed);

        Ok(CallPermit { breaker: self, probe, generation: state.generation, settled: false })
    }

    /// Run `operation` under breaker protection and the per-call timeout.
    ///
    /// Every `Ok` value is a success; use [`Self::execute_with`] when some
    /// successful values should still count against the backend.
    #[instrument(skip(self, operation), fields(command = %self.name))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.execute_with(operation, |_| true).await
    }

    /// Like [`Self::execute`], but `is_success` decides whether an `Ok` value
    /// is reported as a success or a failure. The value is returned either
    /// way.
    pub async fn execute_with<F, Fut, T, E, S>(&self, operation: F, is_success: S) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        S: FnOnce(&T) -> bool,
    {
        let permit = self.try_acquire()?;

        match tokio::time::timeout(self.config.timeout, operation()).await {
            Ok(Ok(value)) => {
                permit.record(is_success(&value));
                Ok(value)
            }
            Ok(Err(error)) => {
                permit.record_failure();
                warn!(command = %self.name, "operation failed - {:?}", error);
                Err(BreakerError::OperationFailed { source: error })
            }
            Err(_) => {
                permit.record_failure();
                warn!(command = %self.name, timeout = ?self.config.timeout, "operation timed out");
                Err(BreakerError::Timeout { timeout: self.config.timeout })
            }
        }
    }

    /// Current state as last recorded.
    ///
    /// An open circuit whose sleep window has passed still reads `Open` until
    /// the next admission attempt moves it to `HalfOpen`.
    pub fn state(&self) -> CircuitState {
        self.lock_state().circuit
    }

    /// Calls currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let now = self.clock.now();
        let mut state = self.lock_state();
        CircuitBreakerMetrics {
            state: state.circuit,
            in_flight: self.in_flight(),
            window: state.window.totals(now),
            admitted_calls: self.admitted_calls.load(Ordering::Acquire),
            rejected_calls: self.rejected_calls.load(Ordering::Acquire),
            opened_at: state.opened_at,
            state_change_time: state.state_change_time,
        }
    }

    /// Force the circuit closed and forget recorded outcomes
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut state = self.lock_state();
        state.window.clear();
        state.transition(CircuitState::Closed, now);
        info!(command = %self.name, "circuit breaker manually reset to closed state");
    }

    fn report(&self, success: bool, probe: bool, generation: u64) {
        let now = self.clock.now();
        let mut state = self.lock_state();

        if probe && generation != state.generation {
            debug!(command = %self.name, "ignoring outcome of a probe from an earlier cycle");
            return;
        }

        if success {
            state.window.record_success(now);
        } else {
            state.window.record_failure(now);
        }

        match state.circuit {
            CircuitState::HalfOpen if probe => {
                if success {
                    state.window.clear();
                    state.transition(CircuitState::Closed, now);
                    info!(command = %self.name, "probe succeeded, circuit closed");
                } else {
                    state.transition(CircuitState::Open, now);
                    warn!(command = %self.name, "probe failed, circuit re-opened");
                }
            }
            CircuitState::Closed => {
                let totals = state.window.totals(now);
                if self.should_trip(&totals) {
                    state.transition(CircuitState::Open, now);
                    warn!(
                        command = %self.name,
                        requests = totals.requests(),
                        error_percentage = totals.error_percentage(),
                        "circuit opened"
                    );
                }
            }
            _ => {}
        }
    }

    fn should_trip(&self, totals: &WindowTotals) -> bool {
        let requests = totals.requests();
        requests > 0
            && requests >= self.config.request_volume_threshold
            && totals.failures.saturating_mul(100)
                >= u64::from(self.config.error_percent_threshold).saturating_mul(requests)
    }

    fn reject_open(&self) -> Rejection {
        self.rejected_calls.fetch_add(1, Ordering::Relaxed);
        debug!(command = %self.name, "circuit open, rejecting call");
        Rejection::CircuitOpen { command: self.name.clone() }
    }

    fn lock_state(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire`].
///
/// Holds one in-flight slot until dropped.
#[must_use = "a dropped permit is reported as a failure"]
pub struct CallPermit<'a, C: Clock = SystemClock> {
    breaker: &'a CircuitBreaker<C>,
    probe: bool,
    generation: u64,
    settled: bool,
}

impl<C: Clock> CallPermit<'_, C> {
    /// Whether this call is the half-open probe
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record_success(self) {
        self.record(true);
    }

    pub fn record_failure(self) {
        self.record(false);
    }

    pub fn record(mut self, success: bool) {
        self.settled = true;
        self.breaker.report(success, self.probe, self.generation);
    }
}

impl<C: Clock> fmt::Debug for CallPermit<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallPermit")
            .field("command", &self.breaker.name)
            .field("probe", &self.probe)
            .finish()
    }
}

impl<C: Clock> Drop for CallPermit<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.report(false, self.probe, self.generation);
        }
        self.breaker.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::clock::MockClock;
    use super::*;

    fn config(volume: u64, threshold: u8) -> CircuitBreakerConfig {
        CircuitBreakerConfig::builder()
            .request_volume_threshold(volume)
            .error_percent_threshold(threshold)
            .sleep_window(Duration::from_secs(10))
            .max_concurrent_requests(100)
            .build()
            .expect("valid config")
    }

    fn breaker(volume: u64, threshold: u8) -> (CircuitBreaker<MockClock>, MockClock) {
        let clock = MockClock::new();
        let cb = CircuitBreaker::with_clock("test", config(volume, threshold), clock.clone())
            .expect("valid breaker");
        (cb, clock)
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_config_validation() {
        let mut config = CircuitBreakerConfig::default();
        assert!(config.validate().is_ok());

        config.error_percent_threshold = 101;
        assert!(config.validate().is_err());
        config.error_percent_threshold = 100;
        assert!(config.validate().is_ok());

        config.max_concurrent_requests = 0;
        assert!(config.validate().is_err());
        config.max_concurrent_requests = 1;

        config.sleep_window = Duration::ZERO;
        assert!(config.validate().is_err());
        config.sleep_window = Duration::from_millis(10);

        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.timeout = Duration::from_millis(10);

        config.rolling_buckets = 0;
        assert!(config.validate().is_err());
        config.rolling_buckets = MAX_ROLLING_BUCKETS;
        assert!(config.validate().is_ok());
        config.rolling_buckets = u32::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_bucket_count_is_rejected_at_construction() {
        let config = CircuitBreakerConfig { rolling_buckets: u32::MAX, ..Default::default() };
        assert!(matches!(
            CircuitBreaker::new("buckets", config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = CircuitBreakerConfig::builder()
            .timeout(Duration::from_millis(1100))
            .max_concurrent_requests(100)
            .error_percent_threshold(25)
            .sleep_window(Duration::from_millis(10))
            .request_volume_threshold(10)
            .rolling_window(Duration::from_secs(5), 5)
            .build()
            .unwrap();

        assert_eq!(config.timeout, Duration::from_millis(1100));
        assert_eq!(config.max_concurrent_requests, 100);
        assert_eq!(config.error_percent_threshold, 25);
        assert_eq!(config.sleep_window, Duration::from_millis(10));
        assert_eq!(config.request_volume_threshold, 10);
        assert_eq!(config.rolling_window, Duration::from_secs(5));
        assert_eq!(config.rolling_buckets, 5);
    }

    #[test]
    fn test_stays_closed_below_volume() {
        let (cb, _) = breaker(10, 25);
        for _ in 0..9 {
            cb.try_acquire().unwrap().record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_opens_at_volume_and_threshold() {
        let (cb, _) = breaker(10, 25);
        for _ in 0..3 {
            cb.try_acquire().unwrap().record_failure();
        }
        for _ in 0..6 {
            cb.try_acquire().unwrap().record_success();
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.try_acquire().unwrap().record_success();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(cb.try_acquire(), Err(Rejection::CircuitOpen { .. })));
    }

    #[test]
    fn test_stays_closed_under_threshold() {
        let (cb, _) = breaker(10, 25);
        for _ in 0..2 {
            cb.try_acquire().unwrap().record_failure();
        }
        for _ in 0..18 {
            cb.try_acquire().unwrap().record_success();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_admits_single_probe() {
        let (cb, clock) = breaker(1, 50);
        cb.try_acquire().unwrap().record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(9));
        assert!(cb.try_acquire().is_err());

        clock.advance(Duration::from_secs(1));
        let probe = cb.try_acquire().expect("probe admitted");
        assert!(probe.is_probe());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(matches!(cb.try_acquire(), Err(Rejection::CircuitOpen { .. })));

        probe.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_failed_probe_reopens() {
        let (cb, clock) = breaker(1, 50);
        cb.try_acquire().unwrap().record_failure();
        clock.advance(Duration::from_secs(10));

        cb.try_acquire().unwrap().record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // sleep window restarts from the failed probe
        clock.advance(Duration::from_secs(5));
        assert!(cb.try_acquire().is_err());
        clock.advance(Duration::from_secs(5));
        assert!(cb.try_acquire().unwrap().is_probe());
    }

    #[test]
    fn test_dropped_probe_counts_as_failure() {
        let (cb, clock) = breaker(1, 50);
        cb.try_acquire().unwrap().record_failure();
        clock.advance(Duration::from_secs(10));

        drop(cb.try_acquire().unwrap());
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.in_flight(), 0);
    }

    #[test]
    fn test_stale_half_open_permit_does_not_settle_later_cycle() {
        let (cb, clock) = breaker(1, 50);
        cb.try_acquire().unwrap().record_failure();
        clock.advance(Duration::from_secs(10));
        let stale = cb.try_acquire().unwrap();
        assert!(stale.is_probe());

        cb.reset();
        cb.try_acquire().unwrap().record_failure();
        clock.advance(Duration::from_secs(10));
        let current = cb.try_acquire().unwrap();
        assert!(current.is_probe());

        stale.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(matches!(cb.try_acquire(), Err(Rejection::CircuitOpen { .. })));

        current.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.in_flight(), 0);
    }

    #[test]
    fn test_concurrency_limit_is_independent_of_state() {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder().max_concurrent_requests(2).build().unwrap();
        let cb = CircuitBreaker::with_clock("limited", config, clock).unwrap();

        let first = cb.try_acquire().unwrap();
        let second = cb.try_acquire().unwrap();
        assert_eq!(cb.in_flight(), 2);
        assert!(matches!(
            cb.try_acquire(),
            Err(Rejection::ConcurrencyLimit { limit: 2, .. })
        ));
        assert_eq!(cb.state(), CircuitState::Closed);

        first.record_success();
        assert!(cb.try_acquire().is_ok());
        second.record_success();
        assert_eq!(cb.in_flight(), 0);
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let (cb, _) = breaker(2, 50);
        cb.try_acquire().unwrap().record_failure();
        cb.try_acquire().unwrap().record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        for _ in 0..5 {
            assert!(cb.try_acquire().is_err());
        }
        let metrics = cb.metrics();
        assert_eq!(metrics.window.requests(), 2);
        assert_eq!(metrics.rejected_calls, 5);
        assert_eq!(metrics.admitted_calls, 2);
    }

    #[test]
    fn test_window_expiry_forgets_old_failures() {
        let (cb, clock) = breaker(4, 50);
        for _ in 0..3 {
            cb.try_acquire().unwrap().record_failure();
        }
        clock.advance(Duration::from_secs(11));
        cb.try_acquire().unwrap().record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_reset_closes_circuit() {
        let (cb, _) = breaker(1, 1);
        cb.try_acquire().unwrap().record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().window.requests(), 0);
    }

    #[tokio::test]
    async fn test_execute_records_outcomes() {
        let (cb, _) = breaker(2, 50);

        let ok: Result<u32, BreakerError<std::io::Error>> = cb.execute(|| async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = cb.execute(|| async { Err::<u32, _>(std::io::Error::other("boom")) }).await;
        assert!(matches!(err, Err(BreakerError::OperationFailed { .. })));
        assert_eq!(cb.state(), CircuitState::Open);

        let rejected = cb.execute(|| async { Ok::<_, std::io::Error>(1) }).await;
        assert!(matches!(rejected, Err(BreakerError::Rejected(Rejection::CircuitOpen { .. }))));
    }

    #[tokio::test]
    async fn test_execute_with_counts_unhealthy_values_as_failures() {
        let (cb, _) = breaker(1, 100);

        let value: Result<u16, BreakerError<std::io::Error>> =
            cb.execute_with(|| async { Ok(503) }, |status| *status < 500).await;

        assert_eq!(value.unwrap(), 503);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let config = CircuitBreakerConfig::builder()
            .timeout(Duration::from_millis(20))
            .request_volume_threshold(1)
            .build()
            .unwrap();
        let cb = CircuitBreaker::new("slow", config).unwrap();

        let result = cb
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, std::io::Error>(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Timeout { .. })));
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.in_flight(), 0);
    }

    #[test]
    fn test_concurrent_probe_admission_is_exclusive() {
        let clock = MockClock::new();
        let cb = Arc::new(
            CircuitBreaker::with_clock("probe", config(1, 50), clock.clone()).unwrap(),
        );
        cb.try_acquire().unwrap().record_failure();
        clock.advance(Duration::from_secs(10));

        let barrier = Arc::new(std::sync::Barrier::new(16));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cb = Arc::clone(&cb);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    // hold the permit until every thread has tried
                    let permit = cb.try_acquire();
                    let admitted = permit.is_ok();
                    std::thread::sleep(Duration::from_millis(50));
                    if let Ok(permit) = permit {
                        permit.record_success();
                    }
                    admitted
                })
            })
            .collect();

        let admitted = handles.into_iter().filter_map(|h| h.join().ok()).filter(|a| *a).count();
        assert_eq!(admitted, 1);
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
