//! Broker seam between the façade and the consumer.
//!
//! The in-memory queue is FIFO with no capacity bound, so a slow consumer
//! lets a backlog grow without pushing back on publishers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tally_core::{BrokerError, TallyResult, TRANSACTION_QUEUE};
use tokio::sync::mpsc;

/// Publishing side of a command queue.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Enqueue one encoded command. Returns once the broker has accepted it.
    async fn publish(&self, payload: Vec<u8>) -> TallyResult<()>;

    /// Name of the queue this publisher targets.
    fn queue(&self) -> &str;
}

/// Receiving side of a command queue.
#[async_trait]
pub trait CommandSource: Send {
    /// Wait for the next payload. `None` once every publisher is gone and
    /// the queue is drained.
    async fn next_message(&mut self) -> Option<Vec<u8>>;

    /// Take the next payload if one is already queued, without waiting.
    fn try_next_message(&mut self) -> Option<Vec<u8>>;
}

/// In-process broker backed by an unbounded channel.
pub struct InMemoryBroker;

impl InMemoryBroker {
    /// Create a queue named `transaction.queue`.
    pub fn channel() -> (InMemoryPublisher, InMemorySubscription) {
        Self::named(TRANSACTION_QUEUE)
    }

    /// Create a queue with the given name.
    pub fn named(queue: impl Into<String>) -> (InMemoryPublisher, InMemorySubscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = queue.into();
        (
            InMemoryPublisher {
                queue: queue.clone(),
                tx,
                published: Arc::new(AtomicU64::new(0)),
            },
            InMemorySubscription { queue, rx },
        )
    }
}

/// Cloneable publisher handle.
#[derive(Debug, Clone)]
pub struct InMemoryPublisher {
    queue: String,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    published: Arc<AtomicU64>,
}

impl InMemoryPublisher {
    /// Payloads accepted across all clones of this handle.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl CommandPublisher for InMemoryPublisher {
    async fn publish(&self, payload: Vec<u8>) -> TallyResult<()> {
        self.tx.send(payload).map_err(|_| BrokerError::Closed {
            queue: self.queue.clone(),
        })?;
        self.published.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(queue = %self.queue, "Command published");
        Ok(())
    }

    fn queue(&self) -> &str {
        &self.queue
    }
}

/// Single subscriber for an in-memory queue.
#[derive(Debug)]
pub struct InMemorySubscription {
    queue: String,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl InMemorySubscription {
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl CommandSource for InMemorySubscription {
    async fn next_message(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    fn try_next_message(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}
