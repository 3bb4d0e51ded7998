//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Total successful deliveries
    delivered_count: AtomicU64,
    /// Total write retries
    retry_count: AtomicU64,
    /// Events abandoned after exhausting retries
    abandoned_count: AtomicU64,
    /// Events dropped from a full queue (oldest first)
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get delivered count
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    /// Increment delivered count
    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get retry count
    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    /// Increment retry count
    pub fn inc_retry_count(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get abandoned count
    pub fn abandoned_count(&self) -> u64 {
        self.abandoned_count.load(Ordering::Relaxed)
    }

    /// Increment abandoned count
    pub fn inc_abandoned_count(&self) {
        self.abandoned_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get dropped count
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Increment dropped count
    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            delivered_count: self.delivered_count(),
            retry_count: self.retry_count(),
            abandoned_count: self.abandoned_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub delivered_count: u64,
    pub retry_count: u64,
    pub abandoned_count: u64,
    pub dropped_count: u64,
}
