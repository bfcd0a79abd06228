//! In-process counters for broker activity.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for monitoring broker behavior.
///
/// Purely in-memory; the embedding host decides whether and how to export
/// them.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    /// Requests submitted through the facade.
    pub requests_submitted: AtomicU64,

    /// Cache lookups that returned a live entry.
    pub cache_hits: AtomicU64,

    /// Cache lookups that missed or hit an expired entry.
    pub cache_misses: AtomicU64,

    /// Actual backend invocations (attempts, including retries).
    pub backend_calls: AtomicU64,

    /// Backend invocations that returned an error.
    pub backend_failures: AtomicU64,

    /// Retries performed after rate-limited failures.
    pub retries: AtomicU64,

    /// Fallback responses served in place of a backend answer.
    pub fallbacks_served: AtomicU64,

    /// Requests short-circuited because the circuit was open.
    pub circuit_rejections: AtomicU64,

    /// Batch flushes that processed at least one item.
    pub batches_flushed: AtomicU64,

    /// Total items processed across all batch flushes.
    pub batch_items: AtomicU64,

    /// Milliseconds spent queued before a flush, summed over all items.
    pub queue_wait_ms: AtomicU64,
}

impl BrokerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.requests_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_call(&self) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_failure(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, size: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.batch_items.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_queue_wait(&self, wait: std::time::Duration) {
        self.queue_wait_ms.fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
    }

    /// Average number of items per flushed batch.
    pub fn avg_batch_size(&self) -> f64 {
        let batches = self.batches_flushed.load(Ordering::Relaxed);
        if batches == 0 {
            return 0.0;
        }
        self.batch_items.load(Ordering::Relaxed) as f64 / batches as f64
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> BrokerStats {
        BrokerStats {
            requests_submitted: self.requests_submitted.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            fallbacks_served: self.fallbacks_served.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            batch_items: self.batch_items.load(Ordering::Relaxed),
            queue_wait_ms: self.queue_wait_ms.load(Ordering::Relaxed),
            avg_batch_size: self.avg_batch_size(),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.requests_submitted.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.backend_calls.store(0, Ordering::Relaxed);
        self.backend_failures.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.fallbacks_served.store(0, Ordering::Relaxed);
        self.circuit_rejections.store(0, Ordering::Relaxed);
        self.batches_flushed.store(0, Ordering::Relaxed);
        self.batch_items.store(0, Ordering::Relaxed);
        self.queue_wait_ms.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of the broker counters at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BrokerStats {
    pub requests_submitted: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub backend_calls: u64,
    pub backend_failures: u64,
    pub retries: u64,
    pub fallbacks_served: u64,
    pub circuit_rejections: u64,
    pub batches_flushed: u64,
    pub batch_items: u64,
    pub queue_wait_ms: u64,
    pub avg_batch_size: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_roundtrip() {
        let metrics = BrokerMetrics::new();

        metrics.record_submitted();
        metrics.record_cache_miss();
        metrics.record_backend_call();
        metrics.record_backend_failure();
        metrics.record_retry();
        metrics.record_backend_call();
        metrics.record_fallback();

        let stats = metrics.snapshot();
        assert_eq!(stats.requests_submitted, 1);
        assert_eq!(stats.backend_calls, 2);
        assert_eq!(stats.backend_failures, 1);
        assert_eq!(stats.retries, 1);
        assert_eq!(stats.fallbacks_served, 1);
    }

    #[test]
    fn test_queue_wait_accumulates() {
        let metrics = BrokerMetrics::new();
        metrics.record_queue_wait(std::time::Duration::from_millis(30));
        metrics.record_queue_wait(std::time::Duration::from_millis(70));
        assert_eq!(metrics.snapshot().queue_wait_ms, 100);
    }

    #[test]
    fn test_avg_batch_size() {
        let metrics = BrokerMetrics::new();
        assert_eq!(metrics.avg_batch_size(), 0.0);

        metrics.record_batch(4);
        metrics.record_batch(6);
        assert_eq!(metrics.avg_batch_size(), 5.0);
    }

    #[test]
    fn test_reset() {
        let metrics = BrokerMetrics::new();
        metrics.record_submitted();
        metrics.record_batch(3);
        metrics.reset();

        let stats = metrics.snapshot();
        assert_eq!(stats.requests_submitted, 0);
        assert_eq!(stats.batches_flushed, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = BrokerMetrics::new();
        metrics.record_submitted();
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["requests_submitted"], 1);
    }
}
