//! Cache backend traits, keys, and cacheable value policy.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::time::Duration;
use tally_core::{TallyResult, Transaction, TransactionId};
use tokio::time::Instant;

/// Named cache region. TTL is uniform across regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheRegion {
    /// Single-entity snapshots keyed by transaction id.
    Transactions,
    /// The full-list snapshot under a fixed sentinel key.
    TransactionList,
}

impl CacheRegion {
    pub fn name(&self) -> &'static str {
        match self {
            CacheRegion::Transactions => "transactions",
            CacheRegion::TransactionList => "transactionsList",
        }
    }
}

/// Sentinel key of the full-list entry.
pub const LIST_SENTINEL: &str = "all";

/// Fully qualified cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    region: CacheRegion,
    key: String,
}

impl CacheKey {
    pub fn new(region: CacheRegion, key: impl Into<String>) -> Self {
        Self {
            region,
            key: key.into(),
        }
    }

    /// Single-entity key for `id`.
    pub fn transaction(id: &TransactionId) -> Self {
        Self::new(CacheRegion::Transactions, id.as_str())
    }

    /// The full-list key.
    pub fn transaction_list() -> Self {
        Self::new(CacheRegion::TransactionList, LIST_SENTINEL)
    }

    pub fn region(&self) -> CacheRegion {
        self.region
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.region.name(), self.key)
    }
}

/// One eviction request: an exact key or a whole region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eviction {
    Key(CacheKey),
    Region(CacheRegion),
}

/// A raw cached snapshot.
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub bytes: Vec<u8>,
    pub cached_at: Instant,
}

/// Values the read-through cache may store.
///
/// `is_cacheable` is the population policy: a loaded value that returns
/// false is handed back to the caller but never written to the cache.
pub trait CacheableValue: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn is_cacheable(&self) -> bool {
        true
    }
}

impl CacheableValue for Transaction {}

/// Empty lists are not cached.
impl CacheableValue for Vec<Transaction> {
    fn is_cacheable(&self) -> bool {
        !self.is_empty()
    }
}

/// Cache backend trait for pluggable cache implementations.
///
/// Backends store opaque bytes; serialization belongs to
/// [`ReadThroughCache`](super::ReadThroughCache). Implementations must be
/// safe for concurrent use from many façade requests.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get an unexpired entry.
    async fn get(&self, key: &CacheKey) -> TallyResult<Option<CachedValue>>;

    /// Store an entry that expires after `ttl`.
    async fn put(&self, key: CacheKey, bytes: Vec<u8>, ttl: Duration) -> TallyResult<()>;

    /// Remove one entry. Returns whether an entry was present.
    async fn evict(&self, key: &CacheKey) -> TallyResult<bool>;

    /// Remove every entry in a region. Returns the number removed.
    async fn evict_region(&self, region: CacheRegion) -> TallyResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> TallyResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired entries included.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries removed by explicit eviction.
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::NewTransaction;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_list_policy_excludes_empty() {
        let empty: Vec<Transaction> = Vec::new();
        assert!(!empty.is_cacheable());

        let one = vec![NewTransaction::new(1.0, "2024-01-01", "debit").with_id("a".into())];
        assert!(one.is_cacheable());
        assert!(one[0].is_cacheable());
    }

    #[test]
    fn test_key_display_includes_region() {
        let key = CacheKey::transaction(&"abc".into());
        assert_eq!(key.to_string(), "transactions::abc");
        assert_eq!(CacheKey::transaction_list().to_string(), "transactionsList::all");
    }
}
