//! Tally Test Utilities
//!
//! Shared test infrastructure for the tally workspace:
//! - Instrumented and failing collaborators (store, publisher, cache backend)
//! - A running consumer pipeline with a settle helper
//! - Proptest generators and fixtures

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use tally_core::{
    BrokerError, CacheError, Command, CommandMessage, NewTransaction, Operation, StoreError,
    TallyError, TallyResult, Transaction, TransactionId,
};
pub use tally_events::{
    CommandConsumer, CommandPublisher, ConsumerMetrics, ConsumerSnapshot, InMemoryBroker,
    InMemoryPublisher,
};
pub use tally_storage::{
    CacheBackend, CacheConfig, CacheKey, CacheRegion, CacheStats, CachedValue, EntityStore,
    InMemoryCacheBackend, InMemoryEntityStore, ReadThroughCache,
};

// ============================================================================
// COUNTING STORE
// ============================================================================

/// Entity store that counts calls per operation before delegating.
pub struct CountingStore {
    inner: Arc<dyn EntityStore>,
    inserts: AtomicUsize,
    find_by_id_calls: AtomicUsize,
    find_all_calls: AtomicUsize,
    saves: AtomicUsize,
    deletes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn EntityStore>) -> Self {
        Self {
            inner,
            inserts: AtomicUsize::new(0),
            find_by_id_calls: AtomicUsize::new(0),
            find_all_calls: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// Counting wrapper over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryEntityStore::new()))
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn find_by_id_calls(&self) -> usize {
        self.find_by_id_calls.load(Ordering::SeqCst)
    }

    pub fn find_all_calls(&self) -> usize {
        self.find_all_calls.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Read calls of either kind.
    pub fn reads(&self) -> usize {
        self.find_by_id_calls() + self.find_all_calls()
    }
}

#[async_trait]
impl EntityStore for CountingStore {
    async fn insert(&self, new: NewTransaction) -> TallyResult<Transaction> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(new).await
    }

    async fn find_by_id(&self, id: &TransactionId) -> TallyResult<Option<Transaction>> {
        self.find_by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn find_all(&self) -> TallyResult<Vec<Transaction>> {
        self.find_all_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_all().await
    }

    async fn save(&self, transaction: &Transaction) -> TallyResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(transaction).await
    }

    async fn delete_by_id(&self, id: &TransactionId) -> TallyResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_by_id(id).await
    }
}

// ============================================================================
// PUBLISHERS
// ============================================================================

/// Publisher that keeps every payload instead of sending it anywhere.
#[derive(Default)]
pub struct RecordingPublisher {
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Recorded payloads decoded as wire messages. Undecodable ones are skipped.
    pub fn messages(&self) -> Vec<CommandMessage> {
        self.payloads()
            .iter()
            .filter_map(|p| CommandMessage::decode(p).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.payloads.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CommandPublisher for RecordingPublisher {
    async fn publish(&self, payload: Vec<u8>) -> TallyResult<()> {
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.push(payload);
        }
        Ok(())
    }

    fn queue(&self) -> &str {
        tally_core::TRANSACTION_QUEUE
    }
}

/// Publisher whose broker is always unreachable.
#[derive(Debug, Default)]
pub struct FailingPublisher {
    attempts: AtomicUsize,
}

impl FailingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandPublisher for FailingPublisher {
    async fn publish(&self, _payload: Vec<u8>) -> TallyResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(BrokerError::PublishFailed {
            queue: tally_core::TRANSACTION_QUEUE.to_string(),
            reason: "broker unreachable".to_string(),
        }
        .into())
    }

    fn queue(&self) -> &str {
        tally_core::TRANSACTION_QUEUE
    }
}

// ============================================================================
// CACHE BACKEND
// ============================================================================

/// In-memory cache backend with switchable read and eviction failures.
pub struct FlakyCacheBackend {
    inner: InMemoryCacheBackend,
    fail_reads: bool,
    fail_evictions: bool,
}

impl FlakyCacheBackend {
    pub fn new(fail_reads: bool, fail_evictions: bool) -> Self {
        Self {
            inner: InMemoryCacheBackend::new(),
            fail_reads,
            fail_evictions,
        }
    }

    pub fn failing_reads() -> Self {
        Self::new(true, false)
    }

    pub fn failing_evictions() -> Self {
        Self::new(false, true)
    }

    pub fn inner(&self) -> &InMemoryCacheBackend {
        &self.inner
    }

    fn unavailable() -> TallyError {
        CacheError::Backend {
            reason: "cache unavailable".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl CacheBackend for FlakyCacheBackend {
    async fn get(&self, key: &CacheKey) -> TallyResult<Option<CachedValue>> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: CacheKey, bytes: Vec<u8>, ttl: Duration) -> TallyResult<()> {
        self.inner.put(key, bytes, ttl).await
    }

    async fn evict(&self, key: &CacheKey) -> TallyResult<bool> {
        if self.fail_evictions {
            return Err(Self::unavailable());
        }
        self.inner.evict(key).await
    }

    async fn evict_region(&self, region: CacheRegion) -> TallyResult<u64> {
        if self.fail_evictions {
            return Err(Self::unavailable());
        }
        self.inner.evict_region(region).await
    }

    async fn stats(&self) -> TallyResult<CacheStats> {
        self.inner.stats().await
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// How long [`PipelineHarness::settle`] waits before giving up.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Store, cache, in-memory broker and a running consumer, wired together.
///
/// Must be started inside a tokio runtime.
pub struct PipelineHarness {
    pub store: Arc<CountingStore>,
    pub cache_backend: Arc<InMemoryCacheBackend>,
    pub cache: ReadThroughCache,
    pub publisher: InMemoryPublisher,
    pub metrics: Arc<ConsumerMetrics>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<Arc<ConsumerMetrics>>,
}

impl PipelineHarness {
    pub fn start() -> Self {
        Self::with_cache_config(CacheConfig::default())
    }

    pub fn with_cache_config(config: CacheConfig) -> Self {
        let store = Arc::new(CountingStore::in_memory());
        let cache_backend = Arc::new(InMemoryCacheBackend::new());
        let cache = ReadThroughCache::new(cache_backend.clone(), config);
        let (publisher, subscription) = InMemoryBroker::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let consumer = CommandConsumer::new(store.clone());
        let metrics = consumer.metrics();
        let handle = tokio::spawn(consumer.run(subscription, shutdown_rx));

        Self {
            store,
            cache_backend,
            cache,
            publisher,
            metrics,
            shutdown_tx,
            handle,
        }
    }

    /// Publisher as a trait object, for wiring into a façade.
    pub fn command_publisher(&self) -> Arc<dyn CommandPublisher> {
        Arc::new(self.publisher.clone())
    }

    pub fn entity_store(&self) -> Arc<dyn EntityStore> {
        self.store.clone()
    }

    /// Wait until every published command reached a terminal outcome.
    ///
    /// Returns `false` if that did not happen within the timeout.
    pub async fn settle(&self) -> bool {
        self.settle_within(DEFAULT_SETTLE_TIMEOUT).await
    }

    pub async fn settle_within(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let s = self.metrics.snapshot();
                if s.applied + s.skipped + s.dropped >= self.publisher.published() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Signal shutdown and wait for the consumer to apply whatever is
    /// already queued, then stop.
    pub async fn shutdown(self) -> ConsumerSnapshot {
        let _ = self.shutdown_tx.send(true);
        match self.handle.await {
            Ok(metrics) => metrics.snapshot(),
            Err(_) => self.metrics.snapshot(),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Finite amounts, including negatives and zero. All survive a JSON
    /// round trip bit-for-bit.
    pub fn arb_amount() -> impl Strategy<Value = f64> {
        prop_oneof![
            Just(0.0),
            (-4_000_000i64..4_000_000).prop_map(|quarters| quarters as f64 / 4.0),
            (0i64..10_000_000).prop_map(|cents| cents as f64 / 100.0),
        ]
    }

    /// Calendar-shaped date strings. The pipeline treats dates as opaque.
    pub fn arb_date() -> impl Strategy<Value = String> {
        "20[0-9]{2}-(0[1-9]|1[0-2])-(0[1-9]|1[0-9]|2[0-8])"
    }

    pub fn arb_kind() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("debit".to_string()),
            Just("credit".to_string()),
            Just("transfer".to_string()),
            "[a-z]{3,12}",
        ]
    }

    pub fn arb_new_transaction() -> impl Strategy<Value = NewTransaction> {
        (arb_amount(), arb_date(), arb_kind())
            .prop_map(|(amount, date, kind)| NewTransaction::new(amount, date, kind))
    }

    /// Ids that no store would have assigned.
    pub fn arb_unknown_id() -> impl Strategy<Value = TransactionId> {
        "unknown-[a-z0-9]{8}".prop_map(TransactionId::from)
    }

    /// Operation strings the consumer does not recognize.
    pub fn arb_unknown_operation() -> impl Strategy<Value = String> {
        "[A-Za-z]{1,12}".prop_filter("must not be a known operation", |op| {
            op.parse::<Operation>().is_err()
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    /// The reference debit: 100.0 on 2024-01-01.
    pub fn debit() -> NewTransaction {
        NewTransaction::new(100.0, "2024-01-01", "debit")
    }

    pub fn credit() -> NewTransaction {
        NewTransaction::new(42.5, "2024-02-15", "credit")
    }

    /// Wire message with the given operation and id, carrying the debit fields.
    pub fn message(operation: &str, id: Option<&str>) -> CommandMessage {
        let fields = debit();
        CommandMessage {
            id: id.map(str::to_string),
            amount: Some(fields.amount),
            date: Some(fields.date),
            kind: Some(fields.kind),
            operation: operation.to_string(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
