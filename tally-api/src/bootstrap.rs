//! Constructor composition for the server binary.

use std::sync::Arc;

use tally_events::{CommandConsumer, ConsumerMetrics, InMemoryBroker};
use tally_storage::{
    CacheConfig, EntityStore, InMemoryCacheBackend, InMemoryEntityStore, LmdbEntityStore,
    ReadThroughCache,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{FacadeConfig, StoreConfig};
use crate::error::{ApiError, ApiResult};
use crate::facade::TransactionFacade;

/// Open the entity store selected by `config`.
pub fn open_store(config: &StoreConfig) -> ApiResult<Arc<dyn EntityStore>> {
    match &config.path {
        Some(path) => {
            let store = LmdbEntityStore::open(path, config.max_size_mb).map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to open store at {}: {}",
                    path.display(),
                    e
                ))
            })?;
            tracing::info!(path = %path.display(), max_size_mb = config.max_size_mb, "Using LMDB store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(InMemoryEntityStore::new()))
        }
    }
}

/// A façade plus the consumer task applying its commands.
pub struct Pipeline {
    pub facade: TransactionFacade,
    pub consumer: JoinHandle<Arc<ConsumerMetrics>>,
}

/// Wire the store, cache, in-memory broker, façade and consumer.
///
/// The consumer stops when `shutdown_rx` flips to `true`. Must be called
/// inside a tokio runtime.
pub fn build_pipeline(
    store: Arc<dyn EntityStore>,
    cache_config: CacheConfig,
    facade_config: FacadeConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> Pipeline {
    let cache = ReadThroughCache::new(Arc::new(InMemoryCacheBackend::new()), cache_config);
    let (publisher, subscription) = InMemoryBroker::channel();

    let consumer = CommandConsumer::new(Arc::clone(&store));
    let consumer = tokio::spawn(consumer.run(subscription, shutdown_rx));

    let facade = TransactionFacade::new(store, cache, Arc::new(publisher), facade_config);
    Pipeline { facade, consumer }
}
