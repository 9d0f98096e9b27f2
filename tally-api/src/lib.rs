//! Tally API - Transaction Façade and REST Layer
//!
//! Serves transaction reads from a TTL cache in front of the entity store
//! and accepts writes by publishing commands for the background consumer.
//! A write's success means it was queued, not applied.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod facade;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use bootstrap::{build_pipeline, open_store, Pipeline};
pub use config::{ApiConfig, FacadeConfig, StoreConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use facade::{Accepted, TransactionFacade, TransactionService, TransactionView};
pub use routes::create_router;
pub use state::AppState;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
