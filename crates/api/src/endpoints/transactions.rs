//! Transaction lifecycle endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use lgu_common::AppResult;
use lgu_core::{DisputeInput, NotesInput, ProposeInput, ProposePickupInput};
use lgu_db::entities::{
    transaction::{self, TransactionKind, TransactionStatus},
    transaction_audit_log::{self, AuditAction, AuditActorRole},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AuthActor, RequestMeta},
    middleware::AppState,
    response::ApiResponse,
};

// ==================== Request/Response Types ====================

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: i32,
    pub item_id: i32,
    pub buyer_id: i32,
    pub seller_id: i32,
    pub transaction_type: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Option<Decimal>,
    pub pickup_at: Option<String>,
    pub pickup_location: Option<String>,
    pub borrow_start_date: Option<String>,
    pub borrow_end_date: Option<String>,
    pub return_date: Option<String>,
    pub buyer_notes: Option<String>,
    pub seller_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl From<transaction::Model> for TransactionResponse {
    fn from(t: transaction::Model) -> Self {
        Self {
            id: t.id,
            item_id: t.item_id,
            buyer_id: t.buyer_id,
            seller_id: t.seller_id,
            transaction_type: t.transaction_type,
            status: t.status,
            amount: t.amount,
            pickup_at: t.pickup_at.map(|d| d.to_rfc3339()),
            pickup_location: t.pickup_location,
            borrow_start_date: t.borrow_start_date.map(|d| d.to_rfc3339()),
            borrow_end_date: t.borrow_end_date.map(|d| d.to_rfc3339()),
            return_date: t.return_date.map(|d| d.to_rfc3339()),
            buyer_notes: t.buyer_notes,
            seller_notes: t.seller_notes,
            created_at: t.created_at.to_rfc3339(),
            updated_at: t.updated_at.to_rfc3339(),
            completed_at: t.completed_at.map(|d| d.to_rfc3339()),
        }
    }
}

/// Audit row response.
#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub id: i32,
    pub actor_id: Option<i32>,
    pub actor_role: AuditActorRole,
    pub action: AuditAction,
    pub from_status: Option<TransactionStatus>,
    pub to_status: Option<TransactionStatus>,
    pub notes: Option<String>,
    pub metadata: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

impl From<transaction_audit_log::Model> for AuditLogResponse {
    fn from(a: transaction_audit_log::Model) -> Self {
        Self {
            id: a.id,
            actor_id: a.actor_id,
            actor_role: a.actor_role,
            action: a.action,
            from_status: a.from_status,
            to_status: a.to_status,
            notes: a.notes,
            metadata: a.metadata,
            ip_address: a.ip_address,
            user_agent: a.user_agent,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

/// Transaction snapshot with its timeline.
#[derive(Debug, Serialize)]
pub struct AuditTrailResponse {
    pub transaction: TransactionResponse,
    pub audit: Vec<AuditLogResponse>,
}

/// The caller's transactions.
#[derive(Debug, Serialize)]
pub struct MyTransactionsResponse {
    pub as_buyer: Vec<TransactionResponse>,
    pub as_seller: Vec<TransactionResponse>,
}

/// Request an item.
#[derive(Debug, Deserialize, Validate)]
pub struct ProposeRequest {
    pub item_id: i32,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Seller's pickup proposal.
#[derive(Debug, Deserialize, Validate)]
pub struct PickupRequest {
    #[validate(length(min = 1))]
    pub pickup_at: String,
    #[validate(length(min = 1, max = 255))]
    pub pickup_location: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Optional note on a transition.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct NotesRequest {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Dispute request.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DisputeRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

fn notes_input(body: Option<Json<NotesRequest>>) -> AppResult<NotesInput> {
    let Json(req) = body.unwrap_or_default();
    req.validate()?;
    Ok(NotesInput { notes: req.notes })
}

// ==================== Handlers ====================

async fn propose(
    AuthActor(actor): AuthActor,
    RequestMeta(ctx): RequestMeta,
    State(state): State<AppState>,
    Json(req): Json<ProposeRequest>,
) -> AppResult<ApiResponse<TransactionResponse>> {
    req.validate()?;

    let tx = state
        .transaction_service
        .propose(
            &actor,
            &ctx,
            ProposeInput {
                item_id: req.item_id,
                notes: req.notes,
            },
        )
        .await?;
    Ok(ApiResponse::ok(tx.into()))
}

fn pickup_input(req: PickupRequest) -> AppResult<ProposePickupInput> {
    req.validate()?;
    Ok(ProposePickupInput {
        pickup_at: req.pickup_at,
        pickup_location: req.pickup_location,
        notes: req.notes,
    })
}

async fn propose_pickup(
    AuthActor(actor): AuthActor,
    RequestMeta(ctx): RequestMeta,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(req): Json<PickupRequest>,
) -> AppResult<ApiResponse<TransactionResponse>> {
    let input = pickup_input(req)?;
    let tx = state
        .transaction_service
        .propose_pickup(&actor, &ctx, id, input)
        .await?;
    Ok(ApiResponse::ok(tx.into()))
}

async fn accept(
    AuthActor(actor): AuthActor,
    RequestMeta(ctx): RequestMeta,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(req): Json<PickupRequest>,
) -> AppResult<ApiResponse<TransactionResponse>> {
    let input = pickup_input(req)?;
    let tx = state
        .transaction_service
        .accept_legacy(&actor, &ctx, id, input)
        .await?;
    Ok(ApiResponse::ok(tx.into()))
}

/// Handlers that take only an optional note share this shape.
macro_rules! notes_handler {
    ($name:ident, $method:ident) => {
        async fn $name(
            AuthActor(actor): AuthActor,
            RequestMeta(ctx): RequestMeta,
            State(state): State<AppState>,
            Path(id): Path<i32>,
            body: Option<Json<NotesRequest>>,
        ) -> AppResult<ApiResponse<TransactionResponse>> {
            let input = notes_input(body)?;
            let tx = state
                .transaction_service
                .$method(&actor, &ctx, id, input)
                .await?;
            Ok(ApiResponse::ok(tx.into()))
        }
    };
}

notes_handler!(confirm, confirm);
notes_handler!(reject_buyer, reject_as_buyer);
notes_handler!(reject_seller, reject_as_seller);
notes_handler!(handover_seller, handover_seller);
notes_handler!(handover_buyer, handover_buyer);
notes_handler!(return_buyer, return_buyer);
notes_handler!(return_seller, return_seller);
notes_handler!(complete, complete);

async fn dispute(
    AuthActor(actor): AuthActor,
    RequestMeta(ctx): RequestMeta,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    body: Option<Json<DisputeRequest>>,
) -> AppResult<ApiResponse<TransactionResponse>> {
    let Json(req) = body.unwrap_or_default();
    req.validate()?;

    let tx = state
        .transaction_service
        .dispute(&actor, &ctx, id, DisputeInput { reason: req.reason })
        .await?;
    Ok(ApiResponse::ok(tx.into()))
}

async fn audit_trail(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<AuditTrailResponse>> {
    let (tx, timeline) = state.transaction_service.audit_timeline(&actor, id).await?;
    Ok(ApiResponse::ok(AuditTrailResponse {
        transaction: tx.into(),
        audit: timeline.into_iter().map(Into::into).collect(),
    }))
}

async fn my_transactions(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<MyTransactionsResponse>> {
    let mine = state.transaction_service.my_transactions(&actor).await?;
    Ok(ApiResponse::ok(MyTransactionsResponse {
        as_buyer: mine.as_buyer.into_iter().map(Into::into).collect(),
        as_seller: mine.as_seller.into_iter().map(Into::into).collect(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transactions", post(propose))
        .route("/transactions/{id}/propose", post(propose_pickup))
        .route("/transactions/{id}/accept", post(accept))
        .route("/transactions/{id}/confirm", post(confirm))
        .route("/transactions/{id}/reject-buyer", post(reject_buyer))
        .route("/transactions/{id}/reject", post(reject_seller))
        .route("/transactions/{id}/handover-seller", post(handover_seller))
        .route("/transactions/{id}/handover-buyer", post(handover_buyer))
        .route("/transactions/{id}/return-buyer", post(return_buyer))
        .route("/transactions/{id}/return-seller", post(return_seller))
        .route("/transactions/{id}/complete", post(complete))
        .route("/transactions/{id}/dispute", post(dispute))
        .route("/transactions/{id}/audit", get(audit_trail))
        .route("/my-transactions", get(my_transactions))
}
