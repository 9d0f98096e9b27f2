//! Transaction REST API Routes
//!
//! Thin axum binding over [`TransactionService`]. Writes answer 202 because
//! the façade only queues them.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tally_core::{NewTransaction, TransactionId};
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiResult};
use crate::facade::TransactionService;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Body for create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub amount: Option<f64>,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl TransactionRequest {
    fn into_fields(self) -> ApiResult<NewTransaction> {
        let amount = self.amount.ok_or_else(|| ApiError::missing_field("amount"))?;
        let date = self.date.ok_or_else(|| ApiError::missing_field("date"))?;
        let kind = self.kind.ok_or_else(|| ApiError::missing_field("type"))?;
        Ok(NewTransaction::new(amount, date, kind))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/transactions
pub async fn create_transaction(
    State(service): State<Arc<dyn TransactionService>>,
    Json(req): Json<TransactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let accepted = service.create(req.into_fields()?).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// GET /api/transactions
pub async fn list_transactions(
    State(service): State<Arc<dyn TransactionService>>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(service.get_all().await?))
}

/// GET /api/transactions/:id
pub async fn get_transaction(
    State(service): State<Arc<dyn TransactionService>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(service.get_by_id(&TransactionId::from(id)).await?))
}

/// PUT /api/transactions/:id
pub async fn update_transaction(
    State(service): State<Arc<dyn TransactionService>>,
    Path(id): Path<String>,
    Json(req): Json<TransactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let accepted = service
        .update(&TransactionId::from(id), req.into_fields()?)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// DELETE /api/transactions/:id
pub async fn delete_transaction(
    State(service): State<Arc<dyn TransactionService>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let accepted = service.delete(&TransactionId::from(id)).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// GET /health
pub async fn health(State(start_time): State<Instant>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the API router with request tracing.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/api/transactions/:id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_requires_every_field() {
        let err = TransactionRequest {
            amount: Some(1.0),
            date: None,
            kind: Some("debit".to_string()),
        }
        .into_fields()
        .unwrap_err();
        assert!(err.message.contains("'date'"));

        let err = TransactionRequest::default().into_fields().unwrap_err();
        assert!(err.message.contains("'amount'"));
    }

    #[test]
    fn test_request_uses_type_field_name() -> Result<(), serde_json::Error> {
        let req: TransactionRequest =
            serde_json::from_str(r#"{"amount":100.0,"date":"2024-01-01","type":"debit"}"#)?;
        assert_eq!(req.kind.as_deref(), Some("debit"));
        Ok(())
    }
}
