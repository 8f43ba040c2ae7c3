//! API endpoints.

mod admin;
mod health;
mod items;
mod transactions;

use axum::Router;

use crate::middleware::AppState;

pub use admin::AdminTransactionResponse;
pub use items::ItemResponse;
pub use transactions::{AuditLogResponse, TransactionResponse};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/marketplace", items::router().merge(transactions::router()))
        .nest("/admin", admin::router())
}

/// Router serving only the liveness probe.
pub fn health_router() -> Router<AppState> {
    health::router()
}
