//! Error types for the request broker.

/// Broker error taxonomy.
///
/// Quota, rate-limit, backend and circuit-open failures are absorbed into
/// fallback responses at the broker facade; callers only ever see
/// `InvalidRequest` and `InvalidConfig` under normal operation.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The backend's usage allotment is exhausted. Not retryable; the only
    /// error that advances circuit-breaker state.
    #[error("backend quota exhausted: {0}")]
    QuotaExceeded(String),

    /// The backend rate-limited us and the retry budget ran out.
    #[error("backend rate limited after retries: {0}")]
    RateLimited(String),

    /// Any other backend failure. Not retryable, not counted by the breaker.
    #[error("backend error: {0}")]
    Backend(String),

    /// Synthetic condition: the circuit breaker is open, no call was made.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// Malformed request (e.g. no messages). A programming error in the
    /// embedding host, raised rather than absorbed.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// Configuration invariant violated at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The reply slot was dropped, e.g. during shutdown.
    #[error("request dropped before completion")]
    ChannelClosed,
}

impl BrokerError {
    /// Whether the facade should serve a fallback response for this error
    /// instead of raising it to the caller.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            BrokerError::QuotaExceeded(_)
                | BrokerError::RateLimited(_)
                | BrokerError::Backend(_)
                | BrokerError::CircuitOpen
                | BrokerError::ChannelClosed
        )
    }
}
