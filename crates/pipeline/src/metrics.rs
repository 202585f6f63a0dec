//! Stage metrics
//!
//! Atomic counters for tracking stage throughput and failures.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single stage
///
/// Shared between the stage's workers and any external observer via `Arc`.
/// The handle stays valid after `run` consumes the stage.
#[derive(Debug, Default)]
pub struct StageMetrics {
    /// Messages taken from the input channel
    received: AtomicU64,

    /// Messages sent to an output channel
    emitted: AtomicU64,

    /// Batches handed to a handler (loaders only)
    batches: AtomicU64,

    /// Handler invocations that returned an error
    failed: AtomicU64,

    /// Failed invocations skipped because fail-on-error is disabled
    skipped: AtomicU64,
}

impl StageMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// Record messages taken from the input
    #[inline]
    pub fn record_received(&self, count: u64) {
        self.received.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a message sent downstream
    #[inline]
    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch of `size` messages handed to a handler
    #[inline]
    pub fn record_batch(&self, size: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.received.fetch_add(size, Ordering::Relaxed);
    }

    /// Record a handler failure
    #[inline]
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handler failure that was skipped
    #[inline]
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of stage metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Messages taken from the input channel
    pub received: u64,
    /// Messages sent to an output channel
    pub emitted: u64,
    /// Batches handed to a handler
    pub batches: u64,
    /// Handler failures
    pub failed: u64,
    /// Handler failures skipped
    pub skipped: u64,
}

impl MetricsSnapshot {
    /// Fraction of handler invocations that failed (0.0 - 1.0)
    ///
    /// Returns None if nothing has been processed.
    pub fn failure_rate(&self) -> Option<f64> {
        let invocations = if self.batches > 0 {
            self.batches
        } else {
            self.received
        };
        if invocations == 0 {
            None
        } else {
            Some(self.failed as f64 / invocations as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let metrics = StageMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert_eq!(metrics.snapshot().failure_rate(), None);
    }

    #[test]
    fn test_record_counts() {
        let metrics = StageMetrics::new();
        metrics.record_received(3);
        metrics.record_emitted();
        metrics.record_emitted();
        metrics.record_failed();
        metrics.record_skipped();

        let s = metrics.snapshot();
        assert_eq!(s.received, 3);
        assert_eq!(s.emitted, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.skipped, 1);
        assert_eq!(s.batches, 0);
    }

    #[test]
    fn test_failure_rate_uses_batches_when_batched() {
        let metrics = StageMetrics::new();
        metrics.record_batch(10);
        metrics.record_batch(10);
        metrics.record_failed();

        let s = metrics.snapshot();
        assert_eq!(s.received, 20);
        assert_eq!(s.failure_rate(), Some(0.5));
    }
}
