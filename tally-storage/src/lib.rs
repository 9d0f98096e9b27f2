//! Tally Storage - Entity Store and Read-Through Cache
//!
//! Defines the [`EntityStore`] abstraction the consumer writes through and
//! the façade reads through, with an in-memory and an LMDB-backed
//! implementation, plus the TTL cache that sits in front of reads.

pub mod cache;
pub mod lmdb_store;
pub mod store;

pub use cache::{
    CacheBackend, CacheConfig, CacheKey, CacheRead, CacheRegion, CacheStats, CacheableValue,
    CachedValue, Eviction, InMemoryCacheBackend, ReadThroughCache,
};
pub use lmdb_store::{LmdbEntityStore, LmdbStoreError};
pub use store::{EntityStore, InMemoryEntityStore};
