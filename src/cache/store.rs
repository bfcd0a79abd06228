//! Content-addressed TTL store for prior responses.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use xxhash_rust::xxh3::xxh3_64;

use crate::types::ChatRequest;

/// Deterministic digest of a request's content and model tier.
pub type CacheKey = u64;

/// A cached response with its insertion time for TTL checking.
struct CacheEntry {
    text: String,
    inserted_at: Instant,
}

impl CacheEntry {
    fn new(text: String) -> Self {
        Self { text, inserted_at: Instant::now() }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

/// TTL-bounded store of prior responses, indexed by request digest.
///
/// Expiry is checked only at read time; there is no background sweep.
/// Not internally synchronized: callers coordinate through the broker's
/// `ResponseCache` wrapper.
pub struct CacheStore {
    entries: HashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: HashMap::new(), ttl }
    }

    /// Hash a request into its cache key.
    ///
    /// The digest covers every segment's role and content plus the model
    /// tier, so structurally identical requests collide on purpose and
    /// tier-specific answers are never confused. The priority flag is a
    /// scheduling hint and is deliberately left out.
    pub fn key_for(request: &ChatRequest) -> CacheKey {
        let mut canonical = String::new();

        for segment in &request.messages {
            canonical.push_str(segment.role.as_str());
            canonical.push('\0');
            canonical.push_str(&segment.content);
            canonical.push('\n');
        }
        canonical.push_str(request.tier.as_str());

        xxh3_64(canonical.as_bytes())
    }

    /// Look up a response, lazily evicting it if its TTL has elapsed.
    pub fn get(&mut self, key: CacheKey) -> Option<String> {
        match self.entries.get(&key) {
            Some(entry) if entry.is_expired(self.ttl) => {
                self.entries.remove(&key);
                None
            }
            Some(entry) => Some(entry.text.clone()),
            None => None,
        }
    }

    /// Store a response. Last write wins on an identical key.
    pub fn put(&mut self, key: CacheKey, text: impl Into<String>) {
        self.entries.insert(key, CacheEntry::new(text.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
