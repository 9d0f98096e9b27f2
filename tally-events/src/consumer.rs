//! Background command consumer.
//!
//! Messages are handled strictly one at a time. Each one ends in exactly one
//! terminal [`ApplyOutcome`] and none is retried:
//!
//! ```text
//! Received -> Decoded -> Dispatched -> Applied | Skipped | Dropped
//! ```
//!
//! The façade has already answered the caller by the time a message arrives
//! here, so nothing in this module can report back to it. Drops go to a
//! [`FailureSink`]; the default one only logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tally_core::{
    Command, CommandError, CommandMessage, Operation, TallyError, TallyResult, TransactionId,
};
use tally_storage::EntityStore;
use tokio::sync::watch;

use crate::broker::CommandSource;

// ============================================================================
// OUTCOMES
// ============================================================================

/// Why a well-formed command changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// UPDATE for an id the store does not hold.
    NotFound,
}

/// A command that could not be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFailure {
    /// Raw `operation` field, when the payload got that far.
    pub operation: Option<String>,
    /// Target id, when one was present.
    pub id: Option<String>,
    pub error: TallyError,
}

/// Terminal state of one consumed message.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied {
        operation: Operation,
        id: TransactionId,
    },
    Skipped {
        operation: Operation,
        id: TransactionId,
        reason: SkipReason,
    },
    Dropped(ApplyFailure),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, ApplyOutcome::Dropped(_))
    }
}

/// Destination for commands the consumer gave up on.
///
/// Swap in a dead-letter publisher here without touching the consumer loop.
pub trait FailureSink: Send + Sync {
    fn record(&self, failure: &ApplyFailure);
}

/// Logs each failure and keeps nothing. Unknown operations are a warning;
/// everything else is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFailureSink;

impl FailureSink for LogFailureSink {
    fn record(&self, failure: &ApplyFailure) {
        match &failure.error {
            TallyError::Command(CommandError::UnknownOperation { operation }) => {
                tracing::warn!(
                    operation = %operation,
                    transaction_id = ?failure.id,
                    "Discarding command with unknown operation"
                );
            }
            error => {
                tracing::error!(
                    error = %error,
                    operation = ?failure.operation,
                    transaction_id = ?failure.id,
                    "Dropping command"
                );
            }
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for consumer activity since startup.
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    /// Payloads taken off the queue
    pub received: AtomicU64,
    /// Commands that changed the store
    pub applied: AtomicU64,
    /// Well-formed commands that were no-ops
    pub skipped: AtomicU64,
    /// Payloads dropped on decode, validation or store failure
    pub dropped: AtomicU64,
}

impl ConsumerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ConsumerSnapshot {
        ConsumerSnapshot {
            received: self.received.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &ApplyOutcome) {
        let counter = match outcome {
            ApplyOutcome::Applied { .. } => &self.applied,
            ApplyOutcome::Skipped { .. } => &self.skipped,
            ApplyOutcome::Dropped(_) => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`ConsumerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerSnapshot {
    pub received: u64,
    pub applied: u64,
    pub skipped: u64,
    pub dropped: u64,
}

// ============================================================================
// CONSUMER
// ============================================================================

/// Applies commands to the entity store.
pub struct CommandConsumer {
    store: Arc<dyn EntityStore>,
    failure_sink: Arc<dyn FailureSink>,
    metrics: Arc<ConsumerMetrics>,
}

impl CommandConsumer {
    /// Consumer that logs dropped commands.
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self::with_failure_sink(store, Arc::new(LogFailureSink))
    }

    pub fn with_failure_sink(store: Arc<dyn EntityStore>, failure_sink: Arc<dyn FailureSink>) -> Self {
        Self {
            store,
            failure_sink,
            metrics: Arc::new(ConsumerMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<ConsumerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Decode, validate and apply one payload.
    ///
    /// Never fails: every error becomes [`ApplyOutcome::Dropped`] and is
    /// handed to the failure sink.
    pub async fn handle_message(&self, payload: &[u8]) -> ApplyOutcome {
        self.metrics.received.fetch_add(1, Ordering::Relaxed);

        let outcome = match CommandMessage::decode(payload) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => ApplyOutcome::Dropped(ApplyFailure {
                operation: None,
                id: None,
                error: e.into(),
            }),
        };

        self.metrics.record(&outcome);
        if let ApplyOutcome::Dropped(failure) = &outcome {
            self.failure_sink.record(failure);
        }
        outcome
    }

    async fn dispatch(&self, message: CommandMessage) -> ApplyOutcome {
        let operation = message.operation.clone();
        let id = message.id.clone();

        if operation == Operation::Create.as_str() && id.is_some() {
            tracing::debug!(transaction_id = ?id, "Ignoring id carried by CREATE");
        }

        let result = match Command::try_from(message) {
            Ok(command) => self.apply(command).await,
            Err(e) => Err(e.into()),
        };

        result.unwrap_or_else(|error| {
            ApplyOutcome::Dropped(ApplyFailure {
                operation: Some(operation),
                id,
                error,
            })
        })
    }

    /// Apply a validated command to the store.
    pub async fn apply(&self, command: Command) -> TallyResult<ApplyOutcome> {
        match command {
            Command::Create(fields) => {
                let created = self.store.insert(fields).await?;
                tracing::info!(transaction_id = %created.id, "Transaction created");
                Ok(ApplyOutcome::Applied {
                    operation: Operation::Create,
                    id: created.id,
                })
            }
            Command::Update { id, fields } => {
                let Some(mut existing) = self.store.find_by_id(&id).await? else {
                    tracing::warn!(transaction_id = %id, "Update for unknown transaction, skipping");
                    return Ok(ApplyOutcome::Skipped {
                        operation: Operation::Update,
                        id,
                        reason: SkipReason::NotFound,
                    });
                };
                existing.apply(fields);
                self.store.save(&existing).await?;
                tracing::info!(transaction_id = %id, "Transaction updated");
                Ok(ApplyOutcome::Applied {
                    operation: Operation::Update,
                    id,
                })
            }
            Command::Delete { id } => {
                self.store.delete_by_id(&id).await?;
                tracing::info!(transaction_id = %id, "Transaction deleted");
                Ok(ApplyOutcome::Applied {
                    operation: Operation::Delete,
                    id,
                })
            }
        }
    }

    /// Consume until shutdown is signalled or the source closes.
    ///
    /// Shutdown is only observed between messages. Once it is, every
    /// payload already sitting in the queue is still applied before the
    /// task returns; only commands published after that point are left
    /// for the next consumer.
    pub async fn run<S: CommandSource>(
        self,
        mut source: S,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Arc<ConsumerMetrics> {
        tracing::info!("Command consumer started");

        loop {
            if *shutdown_rx.borrow() {
                self.drain(&mut source).await;
                break;
            }

            let payload = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        tracing::info!("Shutdown channel closed");
                        self.drain(&mut source).await;
                        break;
                    }
                    continue;
                }

                message = source.next_message() => match message {
                    Some(payload) => payload,
                    None => {
                        tracing::info!("Command source closed");
                        break;
                    }
                },
            };

            self.handle_message(&payload).await;
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            received = snapshot.received,
            applied = snapshot.applied,
            skipped = snapshot.skipped,
            dropped = snapshot.dropped,
            "Command consumer stopped"
        );

        self.metrics
    }

    async fn drain<S: CommandSource>(&self, source: &mut S) {
        let mut drained = 0u64;
        while let Some(payload) = source.try_next_message() {
            self.handle_message(&payload).await;
            drained += 1;
        }
        tracing::info!(drained, "Command consumer shutting down");
    }
}

// ============================================================================
// TESTS
// ============================================================================
