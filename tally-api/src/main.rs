//! Tally API Server Entry Point
//!
//! Bootstraps configuration, starts the command consumer and serves the
//! REST API until ctrl-c.

use std::sync::Arc;

use tally_api::{
    build_pipeline, create_router, init_tracing, open_store, ApiConfig, ApiError, ApiResult,
    AppState, FacadeConfig, StoreConfig, TelemetryConfig,
};
use tally_core::TallyError;
use tally_storage::CacheConfig;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env().map_err(TallyError::from)?;
    let addr = api_config.socket_addr().map_err(TallyError::from)?;
    let store_config = StoreConfig::from_env().map_err(TallyError::from)?;
    let cache_config = CacheConfig::from_env().map_err(TallyError::from)?;
    let store = open_store(&store_config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline = build_pipeline(
        store,
        cache_config,
        FacadeConfig::from_env(),
        shutdown_rx,
    );
    let app = create_router(AppState::new(Arc::new(pipeline.facade)));

    tracing::info!(%addr, "Starting tally API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    match pipeline.consumer.await {
        Ok(metrics) => {
            let snapshot = metrics.snapshot();
            tracing::info!(
                received = snapshot.received,
                applied = snapshot.applied,
                dropped = snapshot.dropped,
                "Consumer drained"
            );
        }
        Err(e) => tracing::error!(error = %e, "Consumer task failed"),
    }

    Ok(())
}
