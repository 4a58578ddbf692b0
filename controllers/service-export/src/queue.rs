//! Event queue.
//!
//! A single-consumer FIFO of `WorkItem`s. Producers (watch notification
//! handlers) push through a cloneable `QueueSender`; exactly one worker
//! drains the queue, so every store mutation is serialized. A failed item
//! is retried in place after the policy delay, which keeps per-key
//! ordering at the cost of blocking the items behind it.

use crate::error::ControllerError;
use crate::health::Metrics;
use export_client::ExportKey;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One reconciliation decision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkItem {
    /// Ensure an export exists for the Service
    Create(ExportKey),
    /// Ensure no export exists for the Service
    Delete(ExportKey),
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Create(key) => write!(f, "create {key}"),
            WorkItem::Delete(key) => write!(f, "delete {key}"),
        }
    }
}

/// How the worker treats a failing item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts
    pub delay: Duration,
    /// Give up after this many failed attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Executes work items for the queue worker.
#[async_trait::async_trait]
pub trait WorkHandler: Send {
    /// Perform one attempt. An `Err` schedules a retry.
    async fn handle(&mut self, item: &WorkItem) -> Result<(), ControllerError>;
}

/// Producer side of the queue
#[derive(Clone)]
pub struct QueueSender {
    tx: mpsc::UnboundedSender<WorkItem>,
    metrics: Arc<Metrics>,
}

impl QueueSender {
    /// Append an item. Returns `false` once the worker has shut down.
    pub fn push(&self, item: WorkItem) -> bool {
        debug!(item = %item, "Queueing work item");
        match self.tx.send(item) {
            Ok(()) => {
                self.metrics.queue_depth.inc();
                true
            }
            Err(mpsc::error::SendError(item)) => {
                warn!(item = %item, "Event queue closed, dropping work item");
                false
            }
        }
    }
}

/// Consumer side of the queue
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<WorkItem>,
    policy: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl EventQueue {
    /// Create a queue and its producer handle
    pub fn new(policy: RetryPolicy, metrics: Arc<Metrics>) -> (Self, QueueSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = QueueSender {
            tx,
            metrics: metrics.clone(),
        };
        (Self { rx, policy, metrics }, sender)
    }

    /// Process items until `cancel` fires or every sender is dropped and
    /// the backlog is drained.
    ///
    /// Cancellation is only observed between attempts; a handler call in
    /// progress always runs to completion.
    pub async fn run<H: WorkHandler>(mut self, handler: &mut H, cancel: CancellationToken) {
        info!("Event queue worker started");

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = self.rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            self.metrics.queue_depth.dec();

            if !self.process(&item, handler, &cancel).await {
                break;
            }
        }

        info!("Event queue worker stopped");
    }

    /// Runs `item` until it succeeds or its retry budget is spent.
    /// Returns `false` if cancelled while waiting to retry.
    async fn process<H: WorkHandler>(
        &self,
        item: &WorkItem,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> bool {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let err = match handler.handle(item).await {
                Ok(()) => return true,
                Err(e) => e,
            };

            if self.policy.max_attempts.is_some_and(|max| attempt >= max) {
                error!(item = %item, attempt = attempt, error = %err, "Giving up on work item");
                self.metrics.queue_dropped_total.inc();
                return true;
            }

            warn!(
                item = %item,
                attempt = attempt,
                error = %err,
                delay = ?self.policy.delay,
                "Work item failed, retrying"
            );
            self.metrics.queue_retries_total.inc();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }
}
