//! Item catalog endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use lgu_common::{AppError, AppResult};
use lgu_core::{CreateItemInput, ItemPage, UpdateItemInput};
use lgu_db::{
    entities::item::{self, ItemCondition, ItemStatus, TransactionKind},
    repositories::ItemListFilter,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::{
    extractors::AuthActor,
    middleware::AppState,
    response::{self, ApiResponse},
};

// ==================== Request/Response Types ====================

/// Item response.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: ItemCondition,
    pub transaction_type: TransactionKind,
    pub price: Option<Decimal>,
    pub lend_duration_days: Option<i32>,
    pub security_deposit: Option<Decimal>,
    pub municipality_id: i32,
    pub barangay_id: Option<i32>,
    pub pickup_location: Option<String>,
    pub images: Vec<String>,
    pub status: ItemStatus,
    pub view_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<item::Model> for ItemResponse {
    fn from(i: item::Model) -> Self {
        Self {
            images: i.image_paths(),
            id: i.id,
            user_id: i.user_id,
            title: i.title,
            description: i.description,
            category: i.category,
            condition: i.condition,
            transaction_type: i.transaction_type,
            price: i.price,
            lend_duration_days: i.lend_duration_days,
            security_deposit: i.security_deposit,
            municipality_id: i.municipality_id,
            barangay_id: i.barangay_id,
            pickup_location: i.pickup_location,
            status: i.status,
            view_count: i.view_count,
            rejection_reason: i.rejection_reason,
            created_at: i.created_at.to_rfc3339(),
            updated_at: i.updated_at.to_rfc3339(),
        }
    }
}

/// Paginated item list.
#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<ItemResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub pages: u64,
}

impl From<ItemPage> for ItemListResponse {
    fn from(p: ItemPage) -> Self {
        Self {
            items: p.items.into_iter().map(Into::into).collect(),
            total: p.total,
            page: p.page,
            per_page: p.per_page,
            pages: p.pages,
        }
    }
}

/// Catalog query.
#[derive(Debug, Default, Deserialize)]
pub struct ListItemsQuery {
    pub municipality_id: Option<i32>,
    pub category: Option<String>,
    pub transaction_type: Option<TransactionKind>,
    pub status: Option<ItemStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Create item request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub condition: ItemCondition,
    pub transaction_type: TransactionKind,
    pub price: Option<Decimal>,
    #[validate(range(min = 1, max = 365))]
    pub lend_duration_days: Option<i32>,
    pub security_deposit: Option<Decimal>,
    #[validate(length(max = 255))]
    pub pickup_location: Option<String>,
}

/// Update item request.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    pub condition: Option<ItemCondition>,
    pub price: Option<Decimal>,
    #[validate(length(max = 255))]
    pub pickup_location: Option<String>,
}

/// Owner's items.
#[derive(Debug, Serialize)]
pub struct MyItemsResponse {
    pub count: usize,
    pub items: Vec<ItemResponse>,
}

/// Image upload result.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub images: Vec<String>,
}

// ==================== Handlers ====================

async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ListItemsQuery>,
) -> AppResult<ApiResponse<ItemListResponse>> {
    let filter = ItemListFilter {
        municipality_id: query.municipality_id,
        category: query.category.filter(|c| !c.trim().is_empty()),
        transaction_type: query.transaction_type,
        status: query.status,
    };
    let page = state
        .item_service
        .list(&filter, query.page, query.per_page)
        .await?;
    Ok(ApiResponse::ok(page.into()))
}

async fn create_item(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<CreateItemRequest>,
) -> AppResult<ApiResponse<ItemResponse>> {
    req.validate()?;

    let input = CreateItemInput {
        title: req.title,
        description: req.description,
        category: req.category,
        condition: req.condition,
        transaction_type: req.transaction_type,
        price: req.price,
        lend_duration_days: req.lend_duration_days,
        security_deposit: req.security_deposit,
        pickup_location: req.pickup_location,
    };
    let item = state.item_service.create(&actor, input).await?;
    Ok(ApiResponse::ok(item.into()))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<ItemResponse>> {
    let item = state.item_service.get(id).await?;
    Ok(ApiResponse::ok(item.into()))
}

async fn update_item(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateItemRequest>,
) -> AppResult<ApiResponse<ItemResponse>> {
    req.validate()?;

    let input = UpdateItemInput {
        title: req.title,
        description: req.description,
        condition: req.condition,
        price: req.price,
        pickup_location: req.pickup_location,
    };
    let item = state.item_service.update(&actor, id, input).await?;
    Ok(ApiResponse::ok(item.into()))
}

async fn delete_item(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    state.item_service.delete(&actor, id).await?;
    Ok(response::ok())
}

async fn upload_image(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<UploadResponse>> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
            .to_vec();
        upload = Some((file_name, content_type, data));
    }

    let (file_name, content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;

    let (url, item) = state
        .item_service
        .attach_image(&actor, id, &file_name, &content_type, &data)
        .await?;
    info!(item_id = id, %url, "Image attached");

    Ok(ApiResponse::ok(UploadResponse {
        url,
        images: item.image_paths(),
    }))
}

async fn my_items(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<MyItemsResponse>> {
    let items: Vec<ItemResponse> = state
        .item_service
        .my_items(&actor)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(ApiResponse::ok(MyItemsResponse {
        count: items.len(),
        items,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/items/{id}/upload", post(upload_image))
        .route("/my-items", get(my_items))
}
