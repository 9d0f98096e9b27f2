//! In-memory TTL cache backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tally_core::TallyResult;
use tokio::time::Instant;

use super::traits::{CacheBackend, CacheKey, CacheRegion, CacheStats, CachedValue};

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    cached_at: Instant,
    expires_at: Instant,
}

/// Concurrent in-memory cache with per-entry expiry.
///
/// Expired entries are removed lazily on the next `get` for their key.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: DashMap<CacheKey, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live or expired entry is stored under `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &CacheKey) -> TallyResult<Option<CachedValue>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(CachedValue {
                    bytes: entry.bytes.clone(),
                    cached_at: entry.cached_at,
                }));
            }
            Some(_) => true,
            None => false,
        };

        // The read guard above is released before removal.
        if expired
            && self
                .entries
                .remove_if(key, |_, entry| entry.expires_at <= now)
                .is_some()
        {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn put(&self, key: CacheKey, bytes: Vec<u8>, ttl: Duration) -> TallyResult<()> {
        let cached_at = Instant::now();
        self.entries.insert(
            key,
            Entry {
                bytes,
                cached_at,
                expires_at: cached_at + ttl,
            },
        );
        Ok(())
    }

    async fn evict(&self, key: &CacheKey) -> TallyResult<bool> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    async fn evict_region(&self, region: CacheRegion) -> TallyResult<u64> {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.region() != region);
        let removed = before.saturating_sub(self.entries.len()) as u64;
        self.evictions.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    async fn stats(&self) -> TallyResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(600);

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() -> TallyResult<()> {
        let backend = InMemoryCacheBackend::new();
        let key = CacheKey::transaction(&"a".into());
        backend.put(key.clone(), b"{}".to_vec(), TTL).await?;

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(backend.get(&key).await?.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(backend.get(&key).await?.is_none());
        assert!(!backend.contains(&key));

        let stats = backend.stats().await?;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_evict_region_leaves_other_region() -> TallyResult<()> {
        let backend = InMemoryCacheBackend::new();
        backend
            .put(CacheKey::transaction(&"a".into()), b"1".to_vec(), TTL)
            .await?;
        backend
            .put(CacheKey::transaction(&"b".into()), b"2".to_vec(), TTL)
            .await?;
        backend
            .put(CacheKey::transaction_list(), b"[]".to_vec(), TTL)
            .await?;

        assert_eq!(backend.evict_region(CacheRegion::Transactions).await?, 2);
        assert!(backend.contains(&CacheKey::transaction_list()));
        assert_eq!(backend.stats().await?.entry_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_evict_absent_key_reports_false() -> TallyResult<()> {
        let backend = InMemoryCacheBackend::new();
        assert!(!backend.evict(&CacheKey::transaction(&"nope".into())).await?);
        assert_eq!(backend.stats().await?.evictions, 0);
        Ok(())
    }
}
