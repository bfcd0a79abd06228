//! Pending queue for batched requests.

use std::collections::VecDeque;

use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

use crate::error::BrokerError;
use crate::types::ChatRequest;

/// A queued request together with the slot its result is delivered to.
///
/// Created at submission and consumed exactly once when the outcome (or a
/// shutdown notice) is sent back to the waiting caller.
pub struct PendingRequest {
    pub request: ChatRequest,
    pub reply: oneshot::Sender<Result<String, BrokerError>>,
    pub queued_at: Instant,
}

impl PendingRequest {
    /// Create a pending request and the receiver its caller awaits.
    pub fn new(request: ChatRequest) -> (Self, oneshot::Receiver<Result<String, BrokerError>>) {
        let (reply, rx) = oneshot::channel();
        (Self { request, reply, queued_at: Instant::now() }, rx)
    }

    pub fn age(&self) -> std::time::Duration {
        self.queued_at.elapsed()
    }
}

/// FIFO queue of pending requests awaiting a flush. Unbounded.
pub struct PendingQueue {
    items: Mutex<VecDeque<PendingRequest>>,
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingQueue {
    pub fn new() -> Self {
        Self { items: Mutex::new(VecDeque::new()) }
    }

    pub async fn push(&self, item: PendingRequest) {
        self.items.lock().await.push_back(item);
    }

    /// Dequeue up to `max` items in submission order.
    pub async fn drain(&self, max: usize) -> Vec<PendingRequest> {
        let mut items = self.items.lock().await;
        let take = max.min(items.len());
        items.drain(..take).collect()
    }

    /// Remove every queued item, e.g. to deliver shutdown notices.
    pub async fn drain_all(&self) -> Vec<PendingRequest> {
        self.items.lock().await.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}
