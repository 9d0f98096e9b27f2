//! Cache layer for the façade's read path.
//!
//! Read-through with explicit eviction. Entries are JSON snapshots taken at
//! population time and expire after a uniform TTL. Nothing here observes
//! store writes: the only invalidation is the eviction the façade performs
//! when it accepts a write, plus TTL expiry.
//!
//! # Staleness windows
//!
//! - Between a write's eviction and the consumer applying it, a read miss
//!   re-fetches the old record and caches it again.
//! - Absent writes, an entry may lag the store by up to the TTL.
//!
//! # Example
//!
//! ```ignore
//! let cache = ReadThroughCache::new(Arc::new(InMemoryCacheBackend::new()), CacheConfig::default());
//!
//! let read = cache
//!     .get_or_load(CacheKey::transaction(&id), || async { store.find_by_id(&id).await })
//!     .await?;
//!
//! cache.evict(&[Eviction::Key(CacheKey::transaction(&id))]).await?;
//! ```

pub mod freshness;
pub mod memory;
pub mod read_through;
pub mod traits;

pub use freshness::CacheRead;
pub use memory::InMemoryCacheBackend;
pub use read_through::{CacheConfig, ReadThroughCache};
pub use traits::{
    CacheBackend, CacheKey, CacheRegion, CacheStats, CacheableValue, CachedValue, Eviction,
};
