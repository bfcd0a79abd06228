//! Batch scheduling for non-priority requests.
//!
//! Low-priority requests are accumulated and flushed as a group, amortizing
//! the pacing interval across many callers arriving close together:
//!
//! ```text
//! submit(priority = false)
//!        │ mpsc intake
//!        ▼
//!   drain loop ──► PendingQueue (FIFO)
//!                        │ every batch_timeout, up to max_batch_size
//!                        ▼
//!                  flush loop ──► partition by tier ──► PacedInvoker
//! ```
//!
//! Both loops are bound to the broker's lifetime: they stop on a shutdown
//! signal and are joined in [`BatchScheduler::shutdown`], so teardown is
//! deterministic.

mod queue;

pub use queue::{PendingQueue, PendingRequest};

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::RateLimitConfig;
use crate::error::BrokerError;
use crate::invoker::PacedInvoker;
use crate::metrics::BrokerMetrics;
use crate::types::ModelTier;

/// Accumulates non-priority requests and flushes them on a timer.
pub struct BatchScheduler {
    config: RateLimitConfig,
    invoker: Arc<PacedInvoker>,
    queue: Arc<PendingQueue>,
    metrics: Arc<BrokerMetrics>,
    intake_tx: mpsc::UnboundedSender<PendingRequest>,
    intake_rx: Mutex<Option<mpsc::UnboundedReceiver<PendingRequest>>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BatchScheduler {
    pub fn new(
        config: RateLimitConfig,
        invoker: Arc<PacedInvoker>,
        metrics: Arc<BrokerMetrics>,
    ) -> Self {
        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            invoker,
            queue: Arc::new(PendingQueue::new()),
            metrics,
            intake_tx,
            intake_rx: Mutex::new(Some(intake_rx)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Whether the background loops are running.
    pub async fn is_running(&self) -> bool {
        !self.tasks.lock().await.is_empty()
    }

    /// Hand a request to the scheduler. Fails once shutdown has begun.
    pub fn enqueue(&self, item: PendingRequest) -> Result<(), BrokerError> {
        if *self.shutdown_tx.borrow() {
            return Err(BrokerError::ChannelClosed);
        }
        self.intake_tx.send(item).map_err(|_| BrokerError::ChannelClosed)
    }

    /// Start the intake drain loop and the timed flush loop. Idempotent.
    pub async fn start(&self) {
        let mut rx_slot = self.intake_rx.lock().await;
        let Some(mut intake_rx) = rx_slot.take() else {
            return;
        };

        let mut tasks = self.tasks.lock().await;

        let queue = self.queue.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    received = intake_rx.recv() => match received {
                        Some(item) => {
                            queue.push(item).await;
                            debug!("request queued for batching");
                        }
                        None => break,
                    },
                }
            }
            // Move anything still in flight onto the queue so shutdown can
            // notify those callers instead of leaving them parked.
            while let Ok(item) = intake_rx.try_recv() {
                queue.push(item).await;
            }
        }));

        let queue = self.queue.clone();
        let invoker = self.invoker.clone();
        let metrics = self.metrics.clone();
        let batch_timeout = self.config.batch_timeout;
        let max_batch_size = self.config.max_batch_size;
        let mut shutdown = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + batch_timeout, batch_timeout);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tick.tick() => {
                        let batch = queue.drain(max_batch_size).await;
                        if batch.is_empty() {
                            continue;
                        }
                        metrics.record_batch(batch.len());
                        for item in &batch {
                            metrics.record_queue_wait(item.age());
                        }
                        debug!(size = batch.len(), "flushing batch");
                        flush(&invoker, batch).await;
                    }
                }
            }
        }));

        info!(
            batch_timeout_ms = self.config.batch_timeout.as_millis() as u64,
            max_batch_size = self.config.max_batch_size,
            "batch scheduler started"
        );
    }

    /// Stop and join the background loops, then notify any still-queued
    /// callers that their request was dropped.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        if handles.is_empty() {
            return;
        }

        // Ignore the error case: it only means no receivers are left.
        let _ = self.shutdown_tx.send(true);

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "batch scheduler task panicked");
            }
        }

        let orphaned = self.queue.drain_all().await;
        if !orphaned.is_empty() {
            info!(count = orphaned.len(), "notifying queued callers of shutdown");
            for item in orphaned {
                let _ = item.reply.send(Err(BrokerError::ChannelClosed));
            }
        }

        info!("batch scheduler stopped");
    }
}

/// Partition a drained batch by model tier and invoke each partition under
/// a single hold of the pacing lock, preserving FIFO within each partition.
async fn flush(invoker: &PacedInvoker, batch: Vec<PendingRequest>) {
    let (light, heavy): (Vec<_>, Vec<_>) =
        batch.into_iter().partition(|item| item.request.tier == ModelTier::Light);

    invoker.invoke_batch(light).await;
    invoker.invoke_batch(heavy).await;
}
