//! Paced backend invocation with retry, backoff and circuit breaking.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::breaker::{CircuitBreaker, CircuitView};
use crate::cache::ResponseCache;
use crate::classify::{classify, ErrorKind};
use crate::config::RateLimitConfig;
use crate::error::BrokerError;
use crate::metrics::BrokerMetrics;
use crate::types::{ChatRequest, MessageSegment, ModelTier};

/// The external inference backend, injected at construction.
///
/// The broker assumes nothing about the transport, only that the call is
/// asynchronous and may fail with a message the classifier can read.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn complete(
        &self,
        messages: &[MessageSegment],
        tier: ModelTier,
    ) -> anyhow::Result<String>;
}

/// State guarded by the pacing lock. The lock is the single point of
/// mutual exclusion in the broker: whoever holds it is the one attempt
/// process-wide allowed to time the interval and mutate breaker state.
struct PacerState {
    last_call: Option<Instant>,
    breaker: CircuitBreaker,
}

/// Enforces the minimum inter-call interval and performs backend calls
/// with retry, backoff and circuit-breaker accounting composed in.
pub struct PacedInvoker {
    config: RateLimitConfig,
    backend: Arc<dyn Backend>,
    cache: Arc<ResponseCache>,
    metrics: Arc<BrokerMetrics>,
    circuit: CircuitView,
    state: Mutex<PacerState>,
}

impl PacedInvoker {
    pub fn new(
        config: RateLimitConfig,
        backend: Arc<dyn Backend>,
        cache: Arc<ResponseCache>,
        metrics: Arc<BrokerMetrics>,
    ) -> Self {
        let breaker = CircuitBreaker::new(
            config.circuit_breaker_threshold,
            config.circuit_breaker_timeout,
        );
        let circuit = breaker.watch();
        Self {
            config,
            backend,
            cache,
            metrics,
            circuit,
            state: Mutex::new(PacerState { last_call: None, breaker }),
        }
    }

    /// Whether the circuit breaker is currently open. Lock-free: safe to
    /// call while a batch flush holds the pacing lock.
    pub fn circuit_open(&self) -> bool {
        self.circuit.is_open()
    }

    /// Invoke the backend for a priority request.
    ///
    /// Checks the breaker and the cache before touching the pacing lock;
    /// an open circuit never reaches the backend, the cache, or the lock.
    pub async fn invoke(&self, request: &ChatRequest) -> Result<String, BrokerError> {
        if self.circuit_open() {
            self.metrics.record_circuit_rejection();
            return Err(BrokerError::CircuitOpen);
        }

        if let Some(text) = self.cache.get(request).await {
            return Ok(text);
        }

        let mut state = self.state.lock().await;

        // The breaker may have tripped while we waited for the lock.
        if state.breaker.is_open() {
            self.metrics.record_circuit_rejection();
            return Err(BrokerError::CircuitOpen);
        }

        // A duplicate in-flight request may have finished while we waited;
        // serve its answer instead of invoking the backend twice.
        if let Some(text) = self.cache.peek(request).await {
            return Ok(text);
        }

        let result = self.attempt_with_retry(&mut state, request).await;
        if let Ok(text) = &result {
            self.cache.put(request, text).await;
        }
        result
    }

    /// Invoke the backend for a partition of batched requests, holding the
    /// pacing lock once for the whole partition. Items are still spaced by
    /// `min_interval`; each item's outcome is delivered through its own
    /// reply slot, so one failure never fails its siblings.
    pub async fn invoke_batch(&self, items: Vec<crate::batch::PendingRequest>) {
        if items.is_empty() {
            return;
        }

        let mut state = self.state.lock().await;

        for item in items {
            if state.breaker.is_open() {
                self.metrics.record_circuit_rejection();
                let _ = item.reply.send(Err(BrokerError::CircuitOpen));
                continue;
            }

            if let Some(text) = self.cache.get(&item.request).await {
                let _ = item.reply.send(Ok(text));
                continue;
            }

            let result = self.attempt_with_retry(&mut state, &item.request).await;
            if let Ok(text) = &result {
                self.cache.put(&item.request, text).await;
            }
            // The caller may have gone away; a dropped receiver is fine.
            let _ = item.reply.send(result);
        }
    }

    /// The per-request attempt loop: up to `max_retries + 1` attempts,
    /// each paced by `min_interval` from the previous call start.
    async fn attempt_with_retry(
        &self,
        state: &mut PacerState,
        request: &ChatRequest,
    ) -> Result<String, BrokerError> {
        let attempts = self.config.max_retries + 1;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..attempts {
            self.wait_for_interval(state).await;

            // Recorded at call start: pacing is measured start-to-start.
            state.last_call = Some(Instant::now());
            self.metrics.record_backend_call();

            match self.backend.complete(&request.messages, request.tier).await {
                Ok(text) => {
                    state.breaker.record_success();
                    debug!(tier = request.tier.as_str(), "backend call succeeded");
                    return Ok(text);
                }
                Err(err) => {
                    self.metrics.record_backend_failure();
                    match classify(&err) {
                        ErrorKind::Quota => {
                            state.breaker.record_quota_error();
                            return Err(BrokerError::QuotaExceeded(format!("{err:#}")));
                        }
                        ErrorKind::RateLimit => {
                            if attempt + 1 >= attempts {
                                warn!(attempts, "rate limited, retry budget exhausted");
                                return Err(BrokerError::RateLimited(format!("{err:#}")));
                            }
                            let wait = backoff.min(self.config.max_backoff);
                            debug!(
                                attempt,
                                wait_ms = wait.as_millis() as u64,
                                "rate limited, backing off"
                            );
                            self.metrics.record_retry();
                            sleep(wait).await;
                            // Grow from the capped value, and only below
                            // the cap, so a long retry run cannot overflow
                            // the Duration.
                            backoff = if wait
                                < self.config.max_backoff.div_f64(self.config.backoff_factor)
                            {
                                wait.mul_f64(self.config.backoff_factor)
                            } else {
                                self.config.max_backoff
                            };
                        }
                        ErrorKind::Other => {
                            return Err(BrokerError::Backend(format!("{err:#}")));
                        }
                    }
                }
            }
        }

        // The loop always returns from its final iteration.
        Err(BrokerError::RateLimited("retry budget exhausted".to_string()))
    }

    /// Wait until `min_interval` has passed since the last call start.
    async fn wait_for_interval(&self, state: &PacerState) {
        if let Some(last) = state.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_interval {
                sleep(self.config.min_interval - elapsed).await;
            }
        }
    }
}
