//! Process-wide request counters.
//!
//! One `ProcessMetricState` lives for the lifetime of the process (or of a
//! test) and is shared by `Arc` with every instrumentor that reports against
//! it. Increments are single atomic operations; a read-then-compute sequence
//! spanning several counters is not atomic with respect to other requests, so
//! derived values are approximate telemetry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ProcessMetricState {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    window_start: Instant,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub elapsed: Duration,
}

impl ProcessMetricState {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            window_start: Instant::now(),
        }
    }

    /// Count an arriving request. Returns the new total.
    pub fn record_arrival(&self) -> u64 {
        self.total_requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a request that finished with an error status. Returns the new total.
    pub fn record_error(&self) -> u64 {
        self.total_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            total_requests: self.total_requests(),
            total_errors: self.total_errors(),
            elapsed: self.window_start.elapsed(),
        }
    }
}

impl Default for ProcessMetricState {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSnapshot {
    /// Cumulative requests per second since the window start.
    ///
    /// A zero-length window yields the raw request count instead of dividing
    /// by zero.
    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_requests as f64 / secs
        } else {
            self.total_requests as f64
        }
    }

    /// Error responses as a percentage of received requests.
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        // Arrivals are counted before errors, so errors can only lag.
        let errors = self.total_errors.min(self.total_requests);
        errors as f64 / self.total_requests as f64 * 100.0
    }
}
