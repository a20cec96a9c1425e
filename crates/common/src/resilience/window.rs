//! Bucketed rolling counters of call outcomes.
//!
//! The window is split into a fixed number of buckets; each bucket covers
//! `window / buckets` of time. Buckets older than the window are discarded
//! lazily whenever the window is read or written.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: Instant,
    successes: u64,
    failures: u64,
}

/// Aggregate counts over the live part of a [`RollingWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowTotals {
    pub successes: u64,
    pub failures: u64,
}

impl WindowTotals {
    pub fn requests(&self) -> u64 {
        self.successes + self.failures
    }

    /// Failure share in percent, `0` when no requests were recorded.
    pub fn error_percentage(&self) -> u8 {
        let requests = self.requests();
        if requests == 0 {
            return 0;
        }
        let pct = self.failures.saturating_mul(100) / requests;
        u8::try_from(pct).unwrap_or(100)
    }
}

/// Success and failure counts over a sliding time window.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    window: Duration,
    bucket_width: Duration,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    /// Create a window of `window` length split into `buckets` buckets.
    ///
    /// A zero bucket count is treated as one bucket. Buckets are allocated
    /// as outcomes arrive.
    pub fn new(window: Duration, buckets: u32) -> Self {
        let bucket_width = (window / buckets.max(1)).max(Duration::from_millis(1));
        Self { window, bucket_width, buckets: VecDeque::new() }
    }

    pub fn record_success(&mut self, now: Instant) {
        self.current(now).successes += 1;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.current(now).failures += 1;
    }

    /// Totals over buckets that are still inside the window at `now`.
    pub fn totals(&mut self, now: Instant) -> WindowTotals {
        self.evict(now);
        self.buckets.iter().fold(WindowTotals::default(), |acc, bucket| WindowTotals {
            successes: acc.successes + bucket.successes,
            failures: acc.failures + bucket.failures,
        })
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn current(&mut self, now: Instant) -> &mut Bucket {
        self.evict(now);
        let needs_new = self
            .buckets
            .back()
            .map_or(true, |bucket| now.saturating_duration_since(bucket.start) >= self.bucket_width);
        if needs_new {
            self.buckets.push_back(Bucket { start: now, successes: 0, failures: 0 });
        }
        let index = self.buckets.len() - 1;
        &mut self.buckets[index]
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if now.saturating_duration_since(front.start) >= self.window {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }
}
