//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;

use crate::facade::TransactionService;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub transactions: Arc<dyn TransactionService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(transactions: Arc<dyn TransactionService>) -> Self {
        Self {
            transactions,
            start_time: Instant::now(),
        }
    }
}

impl FromRef<AppState> for Arc<dyn TransactionService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.transactions)
    }
}

impl FromRef<AppState> for Instant {
    fn from_ref(state: &AppState) -> Self {
        state.start_time
    }
}
