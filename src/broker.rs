//! Public facade for the request broker.

use std::sync::Arc;

use tracing::{info, warn};

use crate::batch::{BatchScheduler, PendingRequest};
use crate::cache::ResponseCache;
use crate::config::RateLimitConfig;
use crate::error::BrokerError;
use crate::fallback::FallbackResponder;
use crate::invoker::{Backend, PacedInvoker};
use crate::metrics::{BrokerMetrics, BrokerStats};
use crate::types::ChatRequest;

/// Entry point for all LLM traffic.
///
/// Routes each request to the paced priority path or the batch queue,
/// consults the cache first, and absorbs quota, rate-limit and circuit
/// conditions into fallback responses so callers see either a genuine
/// answer, a cached answer, or a canned degraded reply. Only a malformed
/// request raises.
pub struct RequestBroker {
    invoker: Arc<PacedInvoker>,
    scheduler: BatchScheduler,
    fallback: FallbackResponder,
    cache: Arc<ResponseCache>,
    metrics: Arc<BrokerMetrics>,
}

impl RequestBroker {
    /// Build a broker around an injected backend. Validates the config.
    pub fn new(config: RateLimitConfig, backend: Arc<dyn Backend>) -> Result<Self, BrokerError> {
        config.validate()?;

        let metrics = Arc::new(BrokerMetrics::new());
        let cache = Arc::new(ResponseCache::new(config.cache_ttl, metrics.clone()));
        let invoker = Arc::new(PacedInvoker::new(
            config.clone(),
            backend,
            cache.clone(),
            metrics.clone(),
        ));
        let scheduler = BatchScheduler::new(config, invoker.clone(), metrics.clone());

        Ok(Self {
            invoker,
            scheduler,
            fallback: FallbackResponder::new(),
            cache,
            metrics,
        })
    }

    /// Start the background batch loops. Idempotent.
    pub async fn initialize(&self) {
        self.scheduler.start().await;
        info!("request broker initialized");
    }

    /// Stop and join the background loops. Queued callers are notified.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("request broker shut down");
    }

    /// Submit a request and wait for its answer.
    ///
    /// Priority requests go straight to the paced invoker; others are
    /// queued for the next batch flush. A broker that has not been
    /// initialized (or has been shut down) serves non-priority requests
    /// on the priority path rather than parking them on a queue nobody
    /// drains.
    pub async fn submit(&self, request: ChatRequest) -> Result<String, BrokerError> {
        self.metrics.record_submitted();

        if request.messages.is_empty() {
            return Err(BrokerError::InvalidRequest("request has no messages"));
        }

        if request.priority || !self.scheduler.is_running().await {
            return match self.invoker.invoke(&request).await {
                Ok(text) => Ok(text),
                Err(err) if err.is_degraded() => Ok(self.degraded_reply(&request, &err)),
                Err(err) => Err(err),
            };
        }

        // An open circuit short-circuits batched requests too, rather than
        // parking them until the next flush. Lock-free, so a flush already
        // holding the pacing lock cannot stall new submissions.
        if self.invoker.circuit_open() {
            self.metrics.record_circuit_rejection();
            return Ok(self.degraded_reply(&request, &BrokerError::CircuitOpen));
        }

        let (item, rx) = PendingRequest::new(request.clone());
        if self.scheduler.enqueue(item).is_err() {
            // Shutdown raced the queue check; fall through to a direct call.
            return match self.invoker.invoke(&request).await {
                Ok(text) => Ok(text),
                Err(err) if err.is_degraded() => Ok(self.degraded_reply(&request, &err)),
                Err(err) => Err(err),
            };
        }

        match rx.await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) if err.is_degraded() => Ok(self.degraded_reply(&request, &err)),
            Ok(Err(err)) => Err(err),
            Err(_) => Ok(self.degraded_reply(&request, &BrokerError::ChannelClosed)),
        }
    }

    /// Snapshot of the broker counters.
    pub fn stats(&self) -> BrokerStats {
        self.metrics.snapshot()
    }

    /// Drop every cached response.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn degraded_reply(&self, request: &ChatRequest, err: &BrokerError) -> String {
        warn!(error = %err, "backend unavailable, serving fallback response");
        self.metrics.record_fallback();
        self.fallback.respond(request)
    }
}
