//! Entity store trait and in-memory implementation.
//!
//! The store is the single source of truth for transactions. The cache is a
//! derived projection of it and the consumer is its only writer.

use std::collections::BTreeMap;

use ::async_trait::async_trait;
use tally_core::{
    new_transaction_id, NewTransaction, StoreError, TallyResult, Transaction, TransactionId,
};
use tokio::sync::RwLock;

/// Keyed record store for transaction entities.
///
/// Implementations must not corrupt a single record under concurrent writes
/// to the same id. No multi-record transaction is required.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert a new transaction; the store assigns the id.
    async fn insert(&self, new: NewTransaction) -> TallyResult<Transaction>;

    /// Get a transaction by id.
    async fn find_by_id(&self, id: &TransactionId) -> TallyResult<Option<Transaction>>;

    /// Get every stored transaction.
    async fn find_all(&self) -> TallyResult<Vec<Transaction>>;

    /// Upsert a transaction that already carries an id.
    async fn save(&self, transaction: &Transaction) -> TallyResult<()>;

    /// Delete by id. Deleting an absent id is a no-op.
    async fn delete_by_id(&self, id: &TransactionId) -> TallyResult<()>;
}

/// In-memory store.
///
/// Records are kept in id order; since ids are UUIDv7 this is creation order.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    records: RwLock<BTreeMap<TransactionId, Transaction>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn insert(&self, new: NewTransaction) -> TallyResult<Transaction> {
        let mut records = self.records.write().await;
        let id = new_transaction_id();
        if records.contains_key(&id) {
            return Err(StoreError::InsertFailed {
                reason: format!("id {} already exists", id),
            }
            .into());
        }
        let transaction = new.with_id(id.clone());
        records.insert(id, transaction.clone());
        Ok(transaction)
    }

    async fn find_by_id(&self, id: &TransactionId) -> TallyResult<Option<Transaction>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> TallyResult<Vec<Transaction>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn save(&self, transaction: &Transaction) -> TallyResult<()> {
        self.records
            .write()
            .await
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn delete_by_id(&self, id: &TransactionId) -> TallyResult<()> {
        self.records.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() -> TallyResult<()> {
        let store = InMemoryEntityStore::new();
        let a = store.insert(NewTransaction::new(1.0, "2024-01-01", "debit")).await?;
        let b = store.insert(NewTransaction::new(1.0, "2024-01-01", "debit")).await?;
        assert_ne!(a.id, b.id);
        assert!(!a.id.as_str().is_empty());
        assert_eq!(store.len().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_record() -> TallyResult<()> {
        let store = InMemoryEntityStore::new();
        let mut tx = store.insert(NewTransaction::new(1.0, "2024-01-01", "debit")).await?;
        tx.apply(NewTransaction::new(9.0, "2024-03-03", "credit"));
        store.save(&tx).await?;
        assert_eq!(store.find_by_id(&tx.id).await?, Some(tx));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_noop() -> TallyResult<()> {
        let store = InMemoryEntityStore::new();
        let tx = store.insert(NewTransaction::new(1.0, "2024-01-01", "debit")).await?;
        store.delete_by_id(&"missing".into()).await?;
        assert_eq!(store.find_all().await?, vec![tx.clone()]);
        store.delete_by_id(&tx.id).await?;
        assert!(store.is_empty().await);
        assert_eq!(store.find_by_id(&tx.id).await?, None);
        Ok(())
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_find_all_returns_every_surviving_record(
                amounts in prop::collection::vec(-1.0e6f64..1.0e6, 0..20),
                delete_mask in prop::collection::vec(any::<bool>(), 20),
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                rt.block_on(async {
                    let store = InMemoryEntityStore::new();
                    let mut kept = Vec::new();
                    for (amount, delete) in amounts.iter().zip(&delete_mask) {
                        let tx = store
                            .insert(NewTransaction::new(*amount, "2024-01-01", "debit"))
                            .await
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        if *delete {
                            store
                                .delete_by_id(&tx.id)
                                .await
                                .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        } else {
                            kept.push(tx);
                        }
                    }
                    kept.sort_by(|a, b| a.id.cmp(&b.id));
                    let mut all = store
                        .find_all()
                        .await
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    all.sort_by(|a, b| a.id.cmp(&b.id));
                    prop_assert_eq!(all, kept);
                    Ok(())
                })?;
            }
        }
    }
}
