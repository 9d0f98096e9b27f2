//! Transaction façade.
//!
//! Reads go cache-then-store. Writes evict the affected cache entries, then
//! publish a command, then return. "Accepted" means queued: the consumer may
//! not have applied the command yet, and may never apply it (see
//! `tally_events::consumer`).
//!
//! Eviction happens at accept time, before publish. A read that misses
//! between eviction and apply re-caches the pre-write record; nothing here
//! closes that window.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_core::{Command, CommandMessage, NewTransaction, TallyError, Transaction, TransactionId};
use tally_events::CommandPublisher;
use tally_storage::{CacheKey, CacheRegion, EntityStore, Eviction, ReadThroughCache};

use crate::config::FacadeConfig;
use crate::error::{ApiError, ApiResult};

pub const CREATE_ACCEPTED: &str = "Transaction creation request sent successfully";
pub const UPDATE_ACCEPTED: &str = "Transaction update request sent successfully";
pub const DELETE_ACCEPTED: &str = "Transaction deletion request sent successfully";
pub const TRANSACTION_FOUND: &str = "Transaction found";
pub const LIST_ITEM: &str = "OK";

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Acknowledgement for a write. Not a confirmation that it was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accepted {
    pub success: bool,
    pub message: String,
}

impl Accepted {
    fn new(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// A transaction as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub success: bool,
    pub message: String,
    pub id: String,
    pub amount: f64,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TransactionView {
    fn from_transaction(transaction: Transaction, message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            id: transaction.id.into_inner(),
            amount: transaction.amount,
            date: transaction.date,
            kind: transaction.kind,
        }
    }
}

// ============================================================================
// SERVICE TRAIT
// ============================================================================

/// The five client-facing operations.
#[async_trait]
pub trait TransactionService: Send + Sync {
    async fn create(&self, fields: NewTransaction) -> ApiResult<Accepted>;

    /// `TransactionNotFound` when the store has no such id.
    async fn get_by_id(&self, id: &TransactionId) -> ApiResult<TransactionView>;

    async fn get_all(&self) -> ApiResult<Vec<TransactionView>>;

    /// Accepted without checking that `id` exists.
    async fn update(&self, id: &TransactionId, fields: NewTransaction) -> ApiResult<Accepted>;

    async fn delete(&self, id: &TransactionId) -> ApiResult<Accepted>;
}

// ============================================================================
// FAÇADE
// ============================================================================

/// Default [`TransactionService`] over a cache, a store and a publisher.
pub struct TransactionFacade {
    store: Arc<dyn EntityStore>,
    cache: ReadThroughCache,
    publisher: Arc<dyn CommandPublisher>,
    config: FacadeConfig,
}

impl TransactionFacade {
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: ReadThroughCache,
        publisher: Arc<dyn CommandPublisher>,
        config: FacadeConfig,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            config,
        }
    }

    pub fn cache(&self) -> &ReadThroughCache {
        &self.cache
    }

    /// Evict, encode, publish. Any failure here is returned to the caller
    /// and the command never reaches the queue.
    async fn submit(&self, command: Command, evictions: &[Eviction]) -> ApiResult<()> {
        self.cache.evict(evictions).await?;

        let payload = CommandMessage::from(&command)
            .encode()
            .map_err(TallyError::from)?;
        self.publisher.publish(payload).await?;

        tracing::info!(
            operation = %command.operation(),
            transaction_id = ?command.id().map(TransactionId::as_str),
            queue = self.publisher.queue(),
            "Command published"
        );
        Ok(())
    }
}

fn require_id(id: &TransactionId) -> ApiResult<()> {
    if id.as_str().trim().is_empty() {
        return Err(ApiError::missing_field("id"));
    }
    Ok(())
}

/// JSON has no encoding for NaN or infinity; serde_json writes them as
/// `null`, which the consumer would drop as a missing amount.
fn require_finite_amount(fields: &NewTransaction) -> ApiResult<()> {
    if !fields.amount.is_finite() {
        return Err(ApiError::invalid_input("amount must be a finite number"));
    }
    Ok(())
}

#[async_trait]
impl TransactionService for TransactionFacade {
    async fn create(&self, fields: NewTransaction) -> ApiResult<Accepted> {
        require_finite_amount(&fields)?;
        let evictions = [
            Eviction::Region(CacheRegion::Transactions),
            Eviction::Region(CacheRegion::TransactionList),
        ];
        self.submit(Command::Create(fields), &evictions).await?;
        Ok(Accepted::new(CREATE_ACCEPTED))
    }

    async fn get_by_id(&self, id: &TransactionId) -> ApiResult<TransactionView> {
        require_id(id)?;
        let store = &self.store;
        let read = self
            .cache
            .get_or_load(CacheKey::transaction(id), move || store.find_by_id(id))
            .await?
            .ok_or_else(|| ApiError::transaction_not_found(id))?;

        tracing::debug!(transaction_id = %id, cache_hit = read.was_cache_hit(), "Transaction read");
        Ok(TransactionView::from_transaction(
            read.into_value(),
            TRANSACTION_FOUND,
        ))
    }

    async fn get_all(&self) -> ApiResult<Vec<TransactionView>> {
        let store = &self.store;
        let read = self
            .cache
            .get_or_load(CacheKey::transaction_list(), move || async move {
                store.find_all().await.map(Some)
            })
            .await?;

        let transactions = match read {
            Some(read) => {
                tracing::debug!(cache_hit = read.was_cache_hit(), "Transaction list read");
                read.into_value()
            }
            None => Vec::new(),
        };

        Ok(transactions
            .into_iter()
            .map(|t| TransactionView::from_transaction(t, LIST_ITEM))
            .collect())
    }

    async fn update(&self, id: &TransactionId, fields: NewTransaction) -> ApiResult<Accepted> {
        require_id(id)?;
        require_finite_amount(&fields)?;
        let mut evictions = vec![Eviction::Key(CacheKey::transaction(id))];
        if self.config.update_evicts_list {
            evictions.push(Eviction::Region(CacheRegion::TransactionList));
        }
        let command = Command::Update {
            id: id.clone(),
            fields,
        };
        self.submit(command, &evictions).await?;
        Ok(Accepted::new(UPDATE_ACCEPTED))
    }

    async fn delete(&self, id: &TransactionId) -> ApiResult<Accepted> {
        require_id(id)?;
        let evictions = [
            Eviction::Key(CacheKey::transaction(id)),
            Eviction::Region(CacheRegion::TransactionList),
        ];
        self.submit(Command::Delete { id: id.clone() }, &evictions).await?;
        Ok(Accepted::new(DELETE_ACCEPTED))
    }
}

// ============================================================================
// TESTS
// ============================================================================
