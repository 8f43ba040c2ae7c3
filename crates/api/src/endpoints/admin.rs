//! Admin oversight endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use lgu_common::AppResult;
use lgu_core::{AdminMarker, AdminStatusInput, ItemStats, TransactionDetail};
use lgu_db::entities::transaction::TransactionStatus;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    items::{ItemListResponse, ItemResponse},
    transactions::{AuditLogResponse, TransactionResponse},
};
use crate::{
    extractors::{AdminActor, RequestMeta},
    middleware::AppState,
    response::ApiResponse,
};

// ==================== Request/Response Types ====================

/// Transaction row in the admin console.
#[derive(Debug, Serialize)]
pub struct AdminTransactionResponse {
    #[serde(flatten)]
    pub transaction: TransactionResponse,
    pub item_title: Option<String>,
    pub municipality_id: Option<i32>,
}

/// Paginated transaction list.
#[derive(Debug, Serialize)]
pub struct AdminTransactionListResponse {
    pub transactions: Vec<AdminTransactionResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub pages: u64,
}

/// Transaction detail with its timeline.
#[derive(Debug, Serialize)]
pub struct AdminTransactionDetailResponse {
    pub transaction: TransactionResponse,
    pub item: Option<ItemResponse>,
    pub audit: Vec<AuditLogResponse>,
}

impl From<TransactionDetail> for AdminTransactionDetailResponse {
    fn from(d: TransactionDetail) -> Self {
        Self {
            transaction: d.transaction.into(),
            item: d.item.map(Into::into),
            audit: d.audit.into_iter().map(Into::into).collect(),
        }
    }
}

/// Admin list query.
#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<TransactionStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Pending item query.
#[derive(Debug, Default, Deserialize)]
pub struct PendingQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Admin decision on a transaction.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminStatusRequest {
    pub status: AdminMarker,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Item rejection.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RejectItemRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

// ==================== Transactions ====================

async fn list_transactions(
    admin: AdminActor,
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> AppResult<ApiResponse<AdminTransactionListResponse>> {
    let page = state
        .oversight_service
        .list(admin.scope, query.status, query.page, query.per_page)
        .await?;

    let transactions = page
        .transactions
        .into_iter()
        .map(|(tx, item)| AdminTransactionResponse {
            transaction: tx.into(),
            item_title: item.as_ref().map(|i| i.title.clone()),
            municipality_id: item.map(|i| i.municipality_id),
        })
        .collect();

    Ok(ApiResponse::ok(AdminTransactionListResponse {
        transactions,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        pages: page.pages,
    }))
}

async fn get_transaction(
    admin: AdminActor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<AdminTransactionDetailResponse>> {
    let detail = state.oversight_service.get(admin.scope, id).await?;
    Ok(ApiResponse::ok(detail.into()))
}

async fn mark_status(
    admin: AdminActor,
    RequestMeta(ctx): RequestMeta,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(req): Json<AdminStatusRequest>,
) -> AppResult<ApiResponse<TransactionResponse>> {
    req.validate()?;

    let tx = state
        .oversight_service
        .mark_status(
            &admin.actor,
            admin.scope,
            &ctx,
            id,
            AdminStatusInput {
                marker: req.status,
                notes: req.notes,
            },
        )
        .await?;
    Ok(ApiResponse::ok(tx.into()))
}

// ==================== Item moderation ====================

async fn pending_items(
    admin: AdminActor,
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> AppResult<ApiResponse<ItemListResponse>> {
    let page = state
        .item_service
        .pending(admin.scope, query.page, query.per_page)
        .await?;
    Ok(ApiResponse::ok(page.into()))
}

async fn marketplace_stats(
    admin: AdminActor,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ItemStats>> {
    let stats = state.item_service.stats(admin.scope).await?;
    Ok(ApiResponse::ok(stats))
}

async fn approve_item(
    admin: AdminActor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<ItemResponse>> {
    let item = state
        .item_service
        .approve(&admin.actor, admin.scope, id)
        .await?;
    Ok(ApiResponse::ok(item.into()))
}

async fn reject_item(
    admin: AdminActor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    body: Option<Json<RejectItemRequest>>,
) -> AppResult<ApiResponse<ItemResponse>> {
    let Json(req) = body.unwrap_or_default();
    req.validate()?;

    let item = state
        .item_service
        .reject(&admin.actor, admin.scope, id, req.reason)
        .await?;
    Ok(ApiResponse::ok(item.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions))
        .route("/transactions/{id}", get(get_transaction))
        .route("/transactions/{id}/status", put(mark_status))
        .route("/marketplace/pending", get(pending_items))
        .route("/marketplace/stats", get(marketplace_stats))
        .route("/marketplace/{id}/approve", post(approve_item))
        .route("/marketplace/{id}/reject", post(reject_item))
}
