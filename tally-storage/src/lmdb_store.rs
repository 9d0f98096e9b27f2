//! LMDB-backed entity store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to persist transactions as
//! JSON documents keyed by id in a single named database.

use std::path::Path;

use ::async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tally_core::{
    new_transaction_id, NewTransaction, StoreError, TallyResult, Transaction, TransactionId,
};

use crate::store::EntityStore;

const DATABASE_NAME: &str = "transactions";

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for tally_core::TallyError {
    fn from(e: LmdbStoreError) -> Self {
        tally_core::TallyError::Store(StoreError::TransactionFailed {
            reason: e.to_string(),
        })
    }
}

/// Persisted transaction store.
///
/// # Example
///
/// ```ignore
/// let store = LmdbEntityStore::open("/var/lib/tally", 256)?;
/// let created = store.insert(NewTransaction::new(100.0, "2024-01-01", "debit")).await?;
/// ```
pub struct LmdbEntityStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbEntityStore {
    /// Open (or create) a store under `path`.
    ///
    /// `max_size_mb` bounds the memory map and therefore the store size.
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(DATABASE_NAME))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    fn put(&self, transaction: &Transaction) -> TallyResult<()> {
        let bytes = serde_json::to_vec(transaction).map_err(|e| StoreError::SaveFailed {
            id: transaction.id.to_string(),
            reason: e.to_string(),
        })?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, transaction.id.as_str().as_bytes(), &bytes)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(())
    }
}

fn decode_record(key: &[u8], bytes: &[u8]) -> TallyResult<Transaction> {
    serde_json::from_slice(bytes).map_err(|e| {
        StoreError::Corrupt {
            id: String::from_utf8_lossy(key).into_owned(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl EntityStore for LmdbEntityStore {
    async fn insert(&self, new: NewTransaction) -> TallyResult<Transaction> {
        let transaction = new.with_id(new_transaction_id());
        self.put(&transaction)?;
        Ok(transaction)
    }

    async fn find_by_id(&self, id: &TransactionId) -> TallyResult<Option<Transaction>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let key = id.as_str().as_bytes();
        match self
            .db
            .get(&rtxn, key)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
        {
            Some(bytes) => Ok(Some(decode_record(key, bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> TallyResult<Vec<Transaction>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut transactions = Vec::new();
        for result in iter {
            let (key, bytes) = result.map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            transactions.push(decode_record(key, bytes)?);
        }
        Ok(transactions)
    }

    async fn save(&self, transaction: &Transaction) -> TallyResult<()> {
        self.put(transaction)
    }

    async fn delete_by_id(&self, id: &TransactionId) -> TallyResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, id.as_str().as_bytes())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        if !deleted {
            tracing::debug!(transaction_id = %id, "Delete of absent transaction");
        }
        Ok(())
    }
}
