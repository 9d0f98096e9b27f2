//! Read-through cache with explicit eviction.
//!
//! The two helpers façade operations call directly are
//! [`ReadThroughCache::get_or_load`] and [`ReadThroughCache::evict`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tally_core::{CacheError, ConfigError, TallyResult};

use super::freshness::CacheRead;
use super::traits::{CacheBackend, CacheKey, CacheableValue, Eviction};

/// Reference TTL for both regions.
pub const DEFAULT_ENTRY_TTL_SECS: u64 = 600;

/// Configuration for the read-through cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries, uniform across regions.
    pub entry_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(DEFAULT_ENTRY_TTL_SECS),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Create CacheConfig from environment variables.
    ///
    /// - `TALLY_CACHE_TTL_SECS`: entry TTL in seconds (default: 600)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secs = match var("TALLY_CACHE_TTL_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                field: "cache ttl".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_ENTRY_TTL_SECS,
        };
        Ok(Self {
            entry_ttl: Duration::from_secs(secs),
        })
    }
}

/// Read-through cache over a pluggable backend.
///
/// Populated lazily on read miss; never written on the write path.
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    /// Create a new read-through cache with default configuration.
    pub fn with_defaults(backend: Arc<dyn CacheBackend>) -> Self {
        Self::new(backend, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn CacheBackend {
        self.backend.as_ref()
    }

    /// Return the cached snapshot for `key`, or run `loader` and populate.
    ///
    /// - Hit: the snapshot is returned and `loader` is not called.
    /// - Miss: `loader` runs. `Ok(None)` from the loader is returned as-is
    ///   and nothing is cached. A loaded value is cached only if
    ///   [`CacheableValue::is_cacheable`] holds.
    ///
    /// Backend read failures and undecodable snapshots are logged and
    /// treated as misses. Loader errors propagate; a failed cache write
    /// after a successful load is logged and the loaded value is returned.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: CacheKey,
        loader: F,
    ) -> TallyResult<Option<CacheRead<T>>>
    where
        T: CacheableValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = TallyResult<Option<T>>>,
    {
        match self.backend.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_slice::<T>(&cached.bytes) {
                Ok(value) => {
                    tracing::trace!(%key, "Cache hit");
                    return Ok(Some(CacheRead::from_cache(value, cached.cached_at)));
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "Discarding undecodable cache entry");
                    if let Err(e) = self.backend.evict(&key).await {
                        tracing::warn!(%key, error = %e, "Failed to evict undecodable entry");
                    }
                }
            },
            Ok(None) => tracing::trace!(%key, "Cache miss"),
            Err(e) => tracing::warn!(%key, error = %e, "Cache read failed, falling back to store"),
        }

        let Some(value) = loader().await? else {
            return Ok(None);
        };

        if value.is_cacheable() {
            if let Err(e) = self.put(key.clone(), &value).await {
                tracing::warn!(%key, error = %e, "Failed to populate cache");
            }
        }

        Ok(Some(CacheRead::from_storage(value)))
    }

    async fn put<T: CacheableValue>(&self, key: CacheKey, value: &T) -> TallyResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.backend.put(key, bytes, self.config.entry_ttl).await
    }

    /// Apply evictions in order. Stops at the first backend failure.
    pub async fn evict(&self, evictions: &[Eviction]) -> TallyResult<()> {
        for eviction in evictions {
            match eviction {
                Eviction::Key(key) => {
                    let removed = self.backend.evict(key).await?;
                    tracing::debug!(%key, removed, "Evicted cache key");
                }
                Eviction::Region(region) => {
                    let removed = self.backend.evict_region(*region).await?;
                    tracing::debug!(region = region.name(), removed, "Cleared cache region");
                }
            }
        }
        Ok(())
    }
}

impl Clone for ReadThroughCache {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheBackend;
    use crate::cache::traits::CacheRegion;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_core::{NewTransaction, StoreError, Transaction};

    fn sample(id: &str) -> Transaction {
        NewTransaction::new(100.0, "2024-01-01", "debit").with_id(id.into())
    }

    fn cache_with(backend: Arc<InMemoryCacheBackend>) -> ReadThroughCache {
        ReadThroughCache::new(backend, CacheConfig::default())
    }

    #[test]
    fn test_ttl_from_vars() -> Result<(), ConfigError> {
        let config = CacheConfig::from_vars(|_: &str| None)?;
        assert_eq!(config.entry_ttl, Duration::from_secs(DEFAULT_ENTRY_TTL_SECS));

        let config = CacheConfig::from_vars(|key: &str| {
            (key == "TALLY_CACHE_TTL_SECS").then(|| "30".to_string())
        })?;
        assert_eq!(config.entry_ttl, Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn test_invalid_ttl_is_rejected() {
        let err = CacheConfig::from_vars(|_: &str| Some("ten minutes".to_string())).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref value, .. } if value == "ten minutes"
        ));
    }

    #[tokio::test]
    async fn test_miss_loads_then_hit_skips_loader() -> TallyResult<()> {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = cache_with(Arc::clone(&backend));
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let key = CacheKey::transaction(&"t1".into());

        for _ in 0..3 {
            let read = cache
                .get_or_load(key.clone(), move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(sample("t1")))
                })
                .await?;
            assert_eq!(read.map(CacheRead::into_value), Some(sample("t1")));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.stats().await?.hits, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_absent_value_is_not_cached() -> TallyResult<()> {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = cache_with(Arc::clone(&backend));
        let key = CacheKey::transaction(&"missing".into());

        let read = cache
            .get_or_load::<Transaction, _, _>(key.clone(), || async { Ok(None) })
            .await?;
        assert!(read.is_none());
        assert!(!backend.contains(&key));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_list_is_not_cached() -> TallyResult<()> {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = cache_with(Arc::clone(&backend));

        let read = cache
            .get_or_load(CacheKey::transaction_list(), || async {
                Ok(Some(Vec::<Transaction>::new()))
            })
            .await?;
        assert_eq!(read.map(CacheRead::into_value), Some(Vec::new()));
        assert!(!backend.contains(&CacheKey::transaction_list()));
        Ok(())
    }

    #[tokio::test]
    async fn test_loader_error_propagates() {
        let cache = cache_with(Arc::new(InMemoryCacheBackend::new()));
        let result = cache
            .get_or_load::<Transaction, _, _>(CacheKey::transaction(&"x".into()), || async {
                Err(StoreError::Unavailable {
                    reason: "down".to_string(),
                }
                .into())
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_undecodable_entry_falls_back_to_loader() -> TallyResult<()> {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let key = CacheKey::transaction(&"t1".into());
        backend
            .put(key.clone(), b"garbage".to_vec(), Duration::from_secs(60))
            .await?;
        let cache = cache_with(Arc::clone(&backend));

        let read = cache
            .get_or_load(key, || async { Ok(Some(sample("t1"))) })
            .await?;
        assert!(read.map(|r| r.was_cache_miss()).unwrap_or(false));
        Ok(())
    }

    #[tokio::test]
    async fn test_evict_key_and_region() -> TallyResult<()> {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = cache_with(Arc::clone(&backend));
        let a = CacheKey::transaction(&"a".into());
        let b = CacheKey::transaction(&"b".into());

        for key in [&a, &b] {
            cache
                .get_or_load(key.clone(), move || async move { Ok(Some(sample(key.key()))) })
                .await?;
        }
        cache
            .get_or_load(CacheKey::transaction_list(), || async {
                Ok(Some(vec![sample("a"), sample("b")]))
            })
            .await?;

        cache
            .evict(&[
                Eviction::Key(a.clone()),
                Eviction::Region(CacheRegion::TransactionList),
            ])
            .await?;

        assert!(!backend.contains(&a));
        assert!(backend.contains(&b));
        assert!(!backend.contains(&CacheKey::transaction_list()));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_reloads_after_ttl() -> TallyResult<()> {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = ReadThroughCache::new(
            backend,
            CacheConfig::new().with_ttl(Duration::from_secs(10)),
        );
        let key = CacheKey::transaction(&"t1".into());
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let load = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(sample("t1")))
        };

        cache.get_or_load(key.clone(), load).await?;
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get_or_load(key.clone(), load).await?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get_or_load(key, load).await?;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
