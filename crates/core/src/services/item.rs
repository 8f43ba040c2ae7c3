//! Item catalog service.

use std::sync::Arc;

use chrono::Utc;
use lgu_common::{
    AppError, AppResult, StorageBackend, config::MarketplaceConfig, generate_image_key,
    image_extension, storage::MAX_IMAGE_BYTES,
};
use lgu_db::{
    entities::item::{self, ItemCondition, ItemStatus, TransactionKind},
    repositories::{ItemListFilter, ItemRepository, TransactionRepository},
};
use rust_decimal::Decimal;
use sea_orm::Set;
use serde::Serialize;
use tracing::{info, warn};

use crate::actor::{Actor, AdminScope};
use crate::services::location::{LocationDirectoryService, slug_or_fallback};
use crate::services::notifier::{MarketplaceEvent, NotificationDispatcherService, dispatch_all};

const MAX_TITLE_LEN: usize = 255;
const MAX_CATEGORY_LEN: usize = 100;

/// Input for listing a new item.
#[derive(Debug, Clone)]
pub struct CreateItemInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: ItemCondition,
    pub transaction_type: TransactionKind,
    pub price: Option<Decimal>,
    pub lend_duration_days: Option<i32>,
    pub security_deposit: Option<Decimal>,
    pub pickup_location: Option<String>,
}

/// Owner edits. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateItemInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub condition: Option<ItemCondition>,
    pub price: Option<Decimal>,
    pub pickup_location: Option<String>,
}

/// One page of catalog results.
#[derive(Debug, Clone, Serialize)]
pub struct ItemPage {
    pub items: Vec<item::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub pages: u64,
}

/// Active listing counts inside an admin's territory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemStats {
    pub total_items: u64,
    pub pending_items: u64,
    pub available_items: u64,
    pub reserved_items: u64,
    pub rejected_items: u64,
}

impl ItemStats {
    fn from_counts(counts: impl IntoIterator<Item = (ItemStatus, i64)>) -> Self {
        let mut stats = Self::default();
        for (status, n) in counts {
            let n = u64::try_from(n).unwrap_or_default();
            stats.total_items += n;
            match status {
                ItemStatus::Pending => stats.pending_items += n,
                ItemStatus::Available => stats.available_items += n,
                ItemStatus::Reserved => stats.reserved_items += n,
                ItemStatus::Rejected => stats.rejected_items += n,
                ItemStatus::Approved | ItemStatus::Completed | ItemStatus::Cancelled => {}
            }
        }
        stats
    }
}

/// Item catalog and moderation.
#[derive(Clone)]
pub struct ItemService {
    item_repo: ItemRepository,
    transaction_repo: TransactionRepository,
    storage: Arc<dyn StorageBackend>,
    locations: LocationDirectoryService,
    notifier: NotificationDispatcherService,
    rules: MarketplaceConfig,
}

fn required(value: &str, field: &str, max_len: Option<usize>) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    match max_len {
        Some(max_len) if value.chars().count() > max_len => {
            return Err(AppError::Validation(format!(
                "{field} must be at most {max_len} characters"
            )));
        }
        _ => {}
    }
    Ok(value.to_string())
}

fn check_price(price: Decimal) -> AppResult<Decimal> {
    if price <= Decimal::ZERO || price > Decimal::new(1_000_000, 0) {
        return Err(AppError::Validation(
            "price must be greater than 0 and at most 1000000".to_string(),
        ));
    }
    Ok(price.round_dp(2))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Highest page number a list endpoint will serve.
pub const MAX_PAGE: u64 = 1_000_000;

/// Longest loan period an item can offer, in days.
pub const MAX_LEND_DAYS: i32 = 365;

/// Clamp `page`/`per_page` and return the resulting offset.
///
/// The offset never exceeds `i64::MAX`, the largest value the database
/// accepts.
pub(crate) fn paginate(page: Option<u64>, per_page: Option<u64>, max: u64) -> (u64, u64, u64) {
    let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
    let per_page = per_page
        .unwrap_or(20)
        .clamp(1, max.clamp(1, i64::MAX as u64));
    let offset = (page - 1).saturating_mul(per_page).min(i64::MAX as u64);
    (page, per_page, offset)
}

impl ItemService {
    #[must_use]
    pub fn new(
        item_repo: ItemRepository,
        transaction_repo: TransactionRepository,
        storage: Arc<dyn StorageBackend>,
        locations: LocationDirectoryService,
        notifier: NotificationDispatcherService,
        rules: MarketplaceConfig,
    ) -> Self {
        Self {
            item_repo,
            transaction_repo,
            storage,
            locations,
            notifier,
            rules,
        }
    }

    /// List a new item. It starts in moderation.
    pub async fn create(&self, actor: &Actor, input: CreateItemInput) -> AppResult<item::Model> {
        actor.require_fully_verified()?;
        let municipality_id = actor.municipality_id.ok_or_else(|| {
            AppError::BadRequest("Set your home municipality before listing items".to_string())
        })?;

        let title = required(&input.title, "title", Some(MAX_TITLE_LEN))?;
        let description = required(&input.description, "description", None)?;
        let category = required(&input.category, "category", Some(MAX_CATEGORY_LEN))?;

        let price = match input.transaction_type {
            TransactionKind::Sell => Some(check_price(input.price.ok_or_else(|| {
                AppError::Validation("price is required for items for sale".to_string())
            })?)?),
            TransactionKind::Donate | TransactionKind::Lend => None,
        };

        let (lend_duration_days, security_deposit) = match input.transaction_type {
            TransactionKind::Lend => {
                if input
                    .lend_duration_days
                    .is_some_and(|days| !(1..=MAX_LEND_DAYS).contains(&days))
                {
                    return Err(AppError::Validation(format!(
                        "lend_duration_days must be between 1 and {MAX_LEND_DAYS}"
                    )));
                }
                if input.security_deposit.is_some_and(|d| d < Decimal::ZERO) {
                    return Err(AppError::Validation(
                        "security_deposit cannot be negative".to_string(),
                    ));
                }
                (input.lend_duration_days, input.security_deposit)
            }
            TransactionKind::Donate | TransactionKind::Sell => (None, None),
        };

        let now = Utc::now();
        let model = item::ActiveModel {
            user_id: Set(actor.id.get()),
            title: Set(title),
            description: Set(description),
            category: Set(category),
            condition: Set(input.condition),
            transaction_type: Set(input.transaction_type),
            price: Set(price),
            lend_duration_days: Set(lend_duration_days),
            security_deposit: Set(security_deposit),
            municipality_id: Set(municipality_id),
            barangay_id: Set(actor.barangay_id),
            pickup_location: Set(optional_text(input.pickup_location)),
            images: Set(serde_json::json!([])),
            status: Set(ItemStatus::Pending),
            is_active: Set(true),
            view_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let item = self.item_repo.create(model).await?;
        info!(item_id = item.id, owner = %actor.id, kind = item.transaction_type.as_str(), "Item listed");
        Ok(item)
    }

    /// Public catalog listing.
    pub async fn list(
        &self,
        filter: &ItemListFilter,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> AppResult<ItemPage> {
        let (page, per_page, offset) = paginate(page, per_page, self.rules.max_page_size);
        let items = self.item_repo.list(filter, per_page, offset).await?;
        let total = self.item_repo.count(filter).await?;

        Ok(ItemPage {
            items,
            total,
            page,
            per_page,
            pages: total.div_ceil(per_page),
        })
    }

    /// Fetch an active item and count the view.
    pub async fn get(&self, id: i32) -> AppResult<item::Model> {
        let mut item = self.item_repo.get_by_id(id).await?;
        if !item.is_active {
            return Err(AppError::NotFound(format!("Item not found: {id}")));
        }
        self.item_repo.increment_view_count(id).await?;
        item.view_count += 1;
        Ok(item)
    }

    /// The caller's active items.
    pub async fn my_items(&self, actor: &Actor) -> AppResult<Vec<item::Model>> {
        self.item_repo.find_by_owner(actor.id.get()).await
    }

    async fn owned_active(&self, actor: &Actor, id: i32) -> AppResult<item::Model> {
        let item = self.item_repo.get_by_id(id).await?;
        if !item.is_active {
            return Err(AppError::NotFound(format!("Item not found: {id}")));
        }
        if item.user_id != actor.id.get() {
            return Err(AppError::Forbidden(
                "Only the owner can modify this item".to_string(),
            ));
        }
        Ok(item)
    }

    /// Owner edit. Refused while a transaction on the item is still open.
    pub async fn update(
        &self,
        actor: &Actor,
        id: i32,
        input: UpdateItemInput,
    ) -> AppResult<item::Model> {
        let item = self.owned_active(actor, id).await?;

        let mut active: item::ActiveModel = item.clone().into();
        if let Some(title) = input.title {
            active.title = Set(required(&title, "title", Some(MAX_TITLE_LEN))?);
        }
        if let Some(description) = input.description {
            active.description = Set(required(&description, "description", None)?);
        }
        if let Some(condition) = input.condition {
            active.condition = Set(condition);
        }
        if let Some(price) = input.price {
            if item.transaction_type != TransactionKind::Sell {
                return Err(AppError::Validation(
                    "price can only be set on items for sale".to_string(),
                ));
            }
            active.price = Set(Some(check_price(price)?));
        }
        if let Some(pickup_location) = input.pickup_location {
            active.pickup_location = Set(optional_text(Some(pickup_location)));
        }

        let txn = self.transaction_repo.begin().await?;
        ItemRepository::touch(&txn, id).await?;
        if TransactionRepository::has_open_for_item(&txn, id).await? {
            return Err(AppError::Conflict(
                "Item has an open transaction".to_string(),
            ));
        }
        let updated = ItemRepository::update_in(&txn, active).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        info!(item_id = id, owner = %actor.id, "Item updated");
        Ok(updated)
    }

    /// Owner soft delete.
    pub async fn delete(&self, actor: &Actor, id: i32) -> AppResult<()> {
        let item = self.owned_active(actor, id).await?;

        let txn = self.transaction_repo.begin().await?;
        ItemRepository::touch(&txn, id).await?;
        if TransactionRepository::has_open_for_item(&txn, id).await? {
            return Err(AppError::Conflict(
                "Item has an open transaction".to_string(),
            ));
        }
        let mut active: item::ActiveModel = item.into();
        active.is_active = Set(false);
        ItemRepository::update_in(&txn, active).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        info!(item_id = id, owner = %actor.id, "Item removed");
        Ok(())
    }

    /// Store an image and attach its URL to the item.
    pub async fn attach_image(
        &self,
        actor: &Actor,
        id: i32,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> AppResult<(String, item::Model)> {
        actor.require_fully_verified()?;
        let item = self.owned_active(actor, id).await?;

        let mut images = item.image_paths();
        if images.len() >= self.rules.max_images {
            return Err(AppError::BadRequest(format!(
                "An item can have at most {} images",
                self.rules.max_images
            )));
        }
        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }
        if data.len() > MAX_IMAGE_BYTES {
            return Err(AppError::BadRequest("Image exceeds 5 MiB".to_string()));
        }
        let extension = image_extension(file_name)?;

        let slug = slug_or_fallback(self.locations.as_ref(), item.municipality_id);
        let key = generate_image_key(&slug, item.id, &extension);
        let uploaded = self.storage.upload(&key, data, content_type).await?;

        images.push(uploaded.url.clone());
        let mut active: item::ActiveModel = item.into();
        active.images = Set(serde_json::json!(images));
        let updated = match self.item_repo.update(active).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&uploaded.key).await {
                    warn!(
                        key = %uploaded.key,
                        error = %cleanup,
                        "Failed to remove orphaned image"
                    );
                }
                return Err(e);
            }
        };

        info!(item_id = id, key = %uploaded.key, size = uploaded.size, "Item image stored");
        Ok((uploaded.url, updated))
    }

    /// Items awaiting moderation inside `scope`.
    pub async fn pending(
        &self,
        scope: AdminScope,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> AppResult<ItemPage> {
        let (page, per_page, offset) = paginate(page, per_page, self.rules.max_page_size);
        let municipality = scope.municipality_filter();
        let items = self
            .item_repo
            .find_pending(municipality, per_page, offset)
            .await?;
        let total = self.item_repo.count_pending(municipality).await?;

        Ok(ItemPage {
            items,
            total,
            page,
            per_page,
            pages: total.div_ceil(per_page),
        })
    }

    /// Listing counts by status for the admin's territory.
    pub async fn stats(&self, scope: AdminScope) -> AppResult<ItemStats> {
        let counts = self
            .item_repo
            .count_by_status(scope.municipality_filter())
            .await?;
        Ok(ItemStats::from_counts(counts))
    }

    async fn pending_in_scope(&self, scope: AdminScope, id: i32) -> AppResult<item::Model> {
        let item = self.item_repo.get_by_id(id).await?;
        scope.ensure_covers(item.municipality_id)?;
        if item.status != ItemStatus::Pending {
            return Err(AppError::BadRequest(
                "Item is not awaiting moderation".to_string(),
            ));
        }
        Ok(item)
    }

    /// Publish a pending item.
    pub async fn approve(
        &self,
        admin: &Actor,
        scope: AdminScope,
        id: i32,
    ) -> AppResult<item::Model> {
        let item = self.pending_in_scope(scope, id).await?;
        let owner = item.user_id;

        let mut active: item::ActiveModel = item.into();
        active.status = Set(ItemStatus::Available);
        active.approved_by = Set(Some(admin.id.get()));
        active.approved_at = Set(Some(Utc::now()));
        let updated = self.item_repo.update(active).await?;

        info!(item_id = id, admin = %admin.id, "Item approved");
        dispatch_all(
            &self.notifier,
            &[owner.into()],
            MarketplaceEvent::ItemModerated {
                item_id: id,
                approved: true,
            },
        )
        .await;
        Ok(updated)
    }

    /// Refuse a pending item.
    pub async fn reject(
        &self,
        admin: &Actor,
        scope: AdminScope,
        id: i32,
        reason: Option<String>,
    ) -> AppResult<item::Model> {
        let item = self.pending_in_scope(scope, id).await?;
        let owner = item.user_id;

        let mut active: item::ActiveModel = item.into();
        active.status = Set(ItemStatus::Rejected);
        active.rejected_by = Set(Some(admin.id.get()));
        active.rejected_at = Set(Some(Utc::now()));
        active.rejection_reason = Set(optional_text(reason));
        let updated = self.item_repo.update(active).await?;

        info!(item_id = id, admin = %admin.id, "Item rejected");
        dispatch_all(
            &self.notifier,
            &[owner.into()],
            MarketplaceEvent::ItemModerated {
                item_id: id,
                approved: false,
            },
        )
        .await;
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::services::{location::StaticLocationDirectory, notifier::NoOpNotificationDispatcher};
    use lgu_common::storage::UploadedFile;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    #[derive(Default)]
    struct RecordingStorage {
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl StorageBackend for RecordingStorage {
        async fn upload(
            &self,
            key: &str,
            data: &[u8],
            content_type: &str,
        ) -> AppResult<UploadedFile> {
            Ok(UploadedFile {
                key: key.to_string(),
                url: self.public_url(key),
                size: data.len() as u64,
                content_type: content_type.to_string(),
                md5: String::new(),
            })
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("/uploads/{key}")
        }
    }

    fn listed_item() -> item::Model {
        let now = Utc::now();
        item::Model {
            id: 7,
            user_id: 2,
            title: "Bike".to_string(),
            description: "Blue".to_string(),
            category: "sports".to_string(),
            condition: ItemCondition::Good,
            transaction_type: TransactionKind::Donate,
            price: None,
            lend_duration_days: None,
            security_deposit: None,
            municipality_id: 10,
            barangay_id: None,
            pickup_location: None,
            images: serde_json::json!([]),
            status: ItemStatus::Available,
            is_active: true,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            view_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_attach_image_removes_upload_when_update_fails() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[listed_item()]])
                .append_query_errors([DbErr::Custom("write failed".to_string())])
                .into_connection(),
        );
        let storage = Arc::new(RecordingStorage::default());
        let service = ItemService::new(
            ItemRepository::new(db.clone()),
            TransactionRepository::new(db),
            storage.clone(),
            Arc::new(StaticLocationDirectory::new(HashMap::from([(
                10,
                "san-isidro".to_string(),
            )]))),
            Arc::new(NoOpNotificationDispatcher),
            MarketplaceConfig::default(),
        );

        let result = service
            .attach_image(&Actor::resident(2, 10), 7, "bike.png", "image/png", b"png")
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        let deleted = storage.deleted.lock().unwrap().clone();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].starts_with("marketplace/san-isidro/7/"));
    }

    #[test]
    fn test_paginate_clamps() {
        assert_eq!(paginate(None, None, 100), (1, 20, 0));
        assert_eq!(paginate(Some(0), Some(500), 100), (1, 100, 0));
        assert_eq!(paginate(Some(3), Some(10), 100), (3, 10, 20));
    }

    #[test]
    fn test_paginate_huge_page_does_not_overflow() {
        assert_eq!(
            paginate(Some(u64::MAX), Some(20), 100),
            (MAX_PAGE, 20, (MAX_PAGE - 1) * 20)
        );

        let (_, per_page, offset) = paginate(Some(u64::MAX), Some(u64::MAX), u64::MAX);
        assert_eq!(per_page, i64::MAX as u64);
        assert_eq!(offset, i64::MAX as u64);
    }

    #[test]
    fn test_stats_fold_counts() {
        let stats = ItemStats::from_counts([
            (ItemStatus::Pending, 2),
            (ItemStatus::Available, 5),
            (ItemStatus::Rejected, 1),
            (ItemStatus::Approved, 1),
        ]);
        assert_eq!(
            stats,
            ItemStats {
                total_items: 9,
                pending_items: 2,
                available_items: 5,
                reserved_items: 0,
                rejected_items: 1,
            }
        );
    }

    #[test]
    fn test_price_bounds() {
        assert!(check_price(Decimal::ZERO).is_err());
        assert!(check_price(Decimal::new(1_000_001, 0)).is_err());
        assert_eq!(
            check_price(Decimal::new(12_346, 3)).ok(),
            Some(Decimal::new(1_235, 2))
        );
    }

    #[test]
    fn test_required_trims_and_limits() {
        assert_eq!(required("  Desk ", "title", Some(10)).ok().as_deref(), Some("Desk"));
        assert!(required("   ", "title", None).is_err());
        assert!(required("abcdefghijk", "title", Some(10)).is_err());
    }
}
