//! Circuit breaker over consecutive quota failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Tracks consecutive quota failures and holds the broker in a degraded
/// mode for a cooldown window once they cross the threshold.
///
/// Closed → Open at `threshold` consecutive quota errors; Open → Closed
/// once the cooldown elapses, at which point the counter resets and the
/// next call is a full, ungated attempt. There is no half-open probe.
///
/// All mutation happens under the invoker's pacing lock; the open/closed
/// state is additionally published through a [`CircuitView`] so callers
/// that must not wait on that lock can still read it.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    consecutive_quota_errors: u32,
    opened_at: Option<Instant>,
    origin: Instant,
    open_until_ms: Arc<AtomicU64>,
}

/// Lock-free reader of the breaker's open/closed state.
///
/// The cooldown deadline is published as milliseconds past a shared
/// origin instant, so readers compare against the clock without touching
/// the pacing lock. Zero means closed.
#[derive(Debug, Clone)]
pub struct CircuitView {
    origin: Instant,
    open_until_ms: Arc<AtomicU64>,
}

impl CircuitView {
    /// Whether the circuit is open right now. Purely a read: an elapsed
    /// cooldown reads as closed here, while the counter reset itself
    /// happens on the next locked [`CircuitBreaker::is_open`] call.
    pub fn is_open(&self) -> bool {
        let until = self.open_until_ms.load(Ordering::Acquire);
        until != 0 && (self.origin.elapsed().as_millis() as u64) < until
    }
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            consecutive_quota_errors: 0,
            opened_at: None,
            origin: Instant::now(),
            open_until_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A cheap, cloneable view of the open/closed state.
    pub fn watch(&self) -> CircuitView {
        CircuitView { origin: self.origin, open_until_ms: self.open_until_ms.clone() }
    }

    /// Whether the circuit is currently open. A cooldown that has elapsed
    /// closes the circuit and resets the failure count as a side effect.
    pub fn is_open(&mut self) -> bool {
        match self.opened_at {
            Some(opened) if opened.elapsed() > self.cooldown => {
                tracing::info!("circuit breaker cooldown elapsed, resuming backend calls");
                self.opened_at = None;
                self.consecutive_quota_errors = 0;
                self.open_until_ms.store(0, Ordering::Release);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Record a quota failure. Returns true if this failure tripped the
    /// circuit open.
    pub fn record_quota_error(&mut self) -> bool {
        self.consecutive_quota_errors += 1;
        if self.opened_at.is_none() && self.consecutive_quota_errors >= self.threshold {
            let now = Instant::now();
            self.opened_at = Some(now);
            let until = now
                .checked_add(self.cooldown)
                .map_or(u64::MAX, |deadline| (deadline - self.origin).as_millis() as u64);
            self.open_until_ms.store(until, Ordering::Release);
            tracing::warn!(
                consecutive = self.consecutive_quota_errors,
                cooldown_secs = self.cooldown.as_secs(),
                "circuit breaker tripped open"
            );
            return true;
        }
        false
    }

    /// Record a successful backend call, clearing the failure streak.
    pub fn record_success(&mut self) {
        self.consecutive_quota_errors = 0;
        self.opened_at = None;
        self.open_until_ms.store(0, Ordering::Release);
    }

    pub fn consecutive_quota_errors(&self) -> u32 {
        self.consecutive_quota_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_at_threshold() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        assert!(!breaker.record_quota_error());
        assert!(!breaker.record_quota_error());
        assert!(!breaker.is_open());

        assert!(breaker.record_quota_error());
        assert!(breaker.is_open());
    }

    #[test]
    fn test_success_resets_streak() {
        let mut breaker = CircuitBreaker::new(2, Duration::from_secs(60));

        breaker.record_quota_error();
        breaker.record_success();
        assert_eq!(breaker.consecutive_quota_errors(), 0);

        // A fresh streak is needed to trip.
        assert!(!breaker.record_quota_error());
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_cooldown_closes_and_resets() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_millis(5));

        assert!(breaker.record_quota_error());
        assert!(breaker.is_open());

        std::thread::sleep(Duration::from_millis(10));

        assert!(!breaker.is_open());
        assert_eq!(breaker.consecutive_quota_errors(), 0);
    }

    #[test]
    fn test_view_tracks_trip_and_cooldown_without_the_breaker() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_millis(5));
        let view = breaker.watch();

        assert!(!view.is_open());
        breaker.record_quota_error();
        assert!(view.is_open());

        // The view reads the cooldown elapse on its own, with no locked
        // breaker call in between.
        std::thread::sleep(Duration::from_millis(10));
        assert!(!view.is_open());
    }

    #[test]
    fn test_view_clears_on_success() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(300));
        let view = breaker.watch();

        breaker.record_quota_error();
        assert!(view.is_open());

        breaker.record_success();
        assert!(!view.is_open());
    }

    #[test]
    fn test_failures_while_open_do_not_extend_cooldown() {
        let mut breaker = CircuitBreaker::new(1, Duration::from_millis(5));

        assert!(breaker.record_quota_error());
        // Another failure while already open keeps the earlier opened_at.
        assert!(!breaker.record_quota_error());

        std::thread::sleep(Duration::from_millis(10));
        assert!(!breaker.is_open());
    }
}
