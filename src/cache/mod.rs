//! Response caching for the broker.
//!
//! A single content-addressed TTL cache sits in front of the backend:
//!
//! ```text
//! Incoming request
//!        │
//!        ▼
//! ┌──────────────┐
//! │ CacheStore   │ ─── xxh3 digest lookup, expiry-on-read
//! └──────┬───────┘
//!        │ miss
//!        ▼
//!   Paced backend call ──► put on success
//! ```

mod store;

pub use store::{CacheKey, CacheStore};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::metrics::BrokerMetrics;
use crate::types::ChatRequest;

/// Shared, async view over the [`CacheStore`], used by both the priority
/// and the batched invocation paths.
pub struct ResponseCache {
    inner: RwLock<CacheStore>,
    metrics: Arc<BrokerMetrics>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, metrics: Arc<BrokerMetrics>) -> Self {
        Self { inner: RwLock::new(CacheStore::new(ttl)), metrics }
    }

    /// Try to get a cached response for the request.
    pub async fn get(&self, request: &ChatRequest) -> Option<String> {
        let key = CacheStore::key_for(request);

        // Lookups take the write lock: an expired entry is evicted in place.
        let mut store = self.inner.write().await;
        match store.get(key) {
            Some(text) => {
                self.metrics.record_cache_hit();
                tracing::debug!(key, "cache hit");
                Some(text)
            }
            None => {
                self.metrics.record_cache_miss();
                None
            }
        }
    }

    /// Like [`ResponseCache::get`], but leaves the hit/miss counters
    /// alone. Used for the second lookup after the pacing lock is taken,
    /// so a single request is counted once.
    pub async fn peek(&self, request: &ChatRequest) -> Option<String> {
        let key = CacheStore::key_for(request);
        self.inner.write().await.get(key)
    }

    /// Store a response for the request.
    pub async fn put(&self, request: &ChatRequest, text: &str) {
        let key = CacheStore::key_for(request);
        let mut store = self.inner.write().await;
        store.put(key, text);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}
