//! Resilience benchmarks
//!
//! Admission and reporting cost of the circuit breaker, and backoff
//! calculation for each strategy.
//!
//! Run with: `cargo bench --bench resilience_bench -p breakwater-common`

use std::time::Duration;

use breakwater_common::resilience::{
    BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, MockClock,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

// ============================================================================
// Circuit Breaker Benchmarks
// ============================================================================

fn bench_circuit_breaker_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker_admission");

    group.bench_function("closed_acquire_and_report", |b| {
        let breaker = CircuitBreaker::new("bench", CircuitBreakerConfig::default())
            .expect("default config is valid");
        b.iter(|| {
            if let Ok(permit) = breaker.try_acquire() {
                permit.record_success();
            }
        });
    });

    group.bench_function("open_short_circuit", |b| {
        let config = CircuitBreakerConfig::builder()
            .request_volume_threshold(1)
            .sleep_window(Duration::from_secs(3600))
            .build()
            .expect("valid config");
        let breaker = CircuitBreaker::with_clock("bench", config, MockClock::new())
            .expect("valid breaker");

        // Trip the breaker so it remains open for the benchmark iterations.
        if let Ok(permit) = breaker.try_acquire() {
            permit.record_failure();
        }

        b.iter(|| black_box(breaker.try_acquire().is_err()));
    });

    group.finish();
}

// ============================================================================
// Backoff Benchmarks
// ============================================================================

fn bench_backoff_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff_wait");

    let strategies = [
        ("constant", BackoffStrategy::constant(Duration::from_millis(10))),
        (
            "constant_jitter",
            BackoffStrategy::constant_with_jitter(Duration::from_millis(10), Duration::from_millis(5)),
        ),
        ("exponential", BackoffStrategy::exponential(Duration::from_millis(10), Duration::from_secs(5))),
        (
            "exponential_jitter",
            BackoffStrategy::exponential_with(
                Duration::from_millis(10),
                Duration::from_secs(5),
                2.0,
                Duration::from_millis(5),
            ),
        ),
    ];

    for (name, strategy) in &strategies {
        group.bench_with_input(BenchmarkId::from_parameter(name), strategy, |b, strategy| {
            b.iter(|| {
                for attempt in 0..16 {
                    black_box(strategy.wait(black_box(attempt)));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_circuit_breaker_admission, bench_backoff_strategies);
criterion_main!(benches);
