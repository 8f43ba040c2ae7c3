//! Item repository.

use std::sync::Arc;

use chrono::Utc;
use lgu_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    sea_query::Expr,
};

use crate::entities::{
    Item,
    item::{self, ItemStatus, TransactionKind},
};

/// Catalog filters for public listing.
#[derive(Debug, Clone, Default)]
pub struct ItemListFilter {
    pub municipality_id: Option<i32>,
    pub category: Option<String>,
    pub transaction_type: Option<TransactionKind>,
    /// Defaults to `available` when absent.
    pub status: Option<ItemStatus>,
}

/// Repository for item operations.
#[derive(Clone)]
pub struct ItemRepository {
    db: Arc<DatabaseConnection>,
}

impl ItemRepository {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an item by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<item::Model>> {
        Self::find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find an item by ID on the given connection or transaction.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> AppResult<Option<item::Model>> {
        Item::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an item by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i32) -> AppResult<item::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item not found: {id}")))
    }

    /// Get an item by ID on the given connection or transaction.
    pub async fn get_by_id_in<C: ConnectionTrait>(conn: &C, id: i32) -> AppResult<item::Model> {
        Self::find_by_id_in(conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item not found: {id}")))
    }

    /// Insert a new item.
    pub async fn create(&self, model: item::ActiveModel) -> AppResult<item::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Persist changes to an item.
    pub async fn update(&self, model: item::ActiveModel) -> AppResult<item::Model> {
        Self::update_in(self.db.as_ref(), model).await
    }

    /// Persist changes to an item on the given connection or transaction.
    pub async fn update_in<C: ConnectionTrait>(
        conn: &C,
        mut model: item::ActiveModel,
    ) -> AppResult<item::Model> {
        model.updated_at = Set(Utc::now());
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Move an item from `expected` to `next` only if it is still in `expected`.
    ///
    /// Returns whether a row was changed.
    pub async fn set_status_if<C: ConnectionTrait>(
        conn: &C,
        id: i32,
        expected: ItemStatus,
        next: ItemStatus,
    ) -> AppResult<bool> {
        let result = Item::update_many()
            .col_expr(item::Column::Status, Expr::value(next))
            .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(item::Column::Id.eq(id))
            .filter(item::Column::Status.eq(expected))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Bump `updated_at` so the row is write-locked for the rest of the
    /// surrounding transaction.
    pub async fn touch<C: ConnectionTrait>(conn: &C, id: i32) -> AppResult<()> {
        let result = Item::update_many()
            .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(item::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Item not found: {id}")));
        }
        Ok(())
    }

    /// Increment the view counter. Lossy under concurrency.
    pub async fn increment_view_count(&self, id: i32) -> AppResult<()> {
        Item::update_many()
            .col_expr(
                item::Column::ViewCount,
                Expr::col(item::Column::ViewCount).add(1),
            )
            .filter(item::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    fn listing_query(filter: &ItemListFilter) -> Select<Item> {
        let mut query = Item::find()
            .filter(item::Column::IsActive.eq(true))
            .filter(item::Column::Status.eq(filter.status.unwrap_or(ItemStatus::Available)));

        if let Some(municipality_id) = filter.municipality_id {
            query = query.filter(item::Column::MunicipalityId.eq(municipality_id));
        }
        if let Some(category) = &filter.category {
            query = query.filter(item::Column::Category.eq(category.as_str()));
        }
        if let Some(kind) = filter.transaction_type {
            query = query.filter(item::Column::TransactionType.eq(kind));
        }
        query
    }

    /// List active items matching the filter, newest first.
    pub async fn list(
        &self,
        filter: &ItemListFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<item::Model>> {
        Self::listing_query(filter)
            .order_by(item::Column::CreatedAt, Order::Desc)
            .order_by(item::Column::Id, Order::Desc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count active items matching the filter.
    pub async fn count(&self, filter: &ItemListFilter) -> AppResult<u64> {
        Self::listing_query(filter)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active items owned by a user, newest first.
    pub async fn find_by_owner(&self, user_id: i32) -> AppResult<Vec<item::Model>> {
        Item::find()
            .filter(item::Column::UserId.eq(user_id))
            .filter(item::Column::IsActive.eq(true))
            .order_by(item::Column::CreatedAt, Order::Desc)
            .order_by(item::Column::Id, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn pending_query(municipality_id: Option<i32>) -> Select<Item> {
        let mut query = Item::find().filter(item::Column::Status.eq(ItemStatus::Pending));
        if let Some(municipality_id) = municipality_id {
            query = query.filter(item::Column::MunicipalityId.eq(municipality_id));
        }
        query
    }

    /// Items awaiting moderation, oldest first.
    pub async fn find_pending(
        &self,
        municipality_id: Option<i32>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<item::Model>> {
        Self::pending_query(municipality_id)
            .order_by(item::Column::CreatedAt, Order::Asc)
            .order_by(item::Column::Id, Order::Asc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count items awaiting moderation.
    pub async fn count_pending(&self, municipality_id: Option<i32>) -> AppResult<u64> {
        Self::pending_query(municipality_id)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active items grouped by status.
    pub async fn count_by_status(
        &self,
        municipality_id: Option<i32>,
    ) -> AppResult<Vec<(ItemStatus, i64)>> {
        let mut query = Item::find().filter(item::Column::IsActive.eq(true));
        if let Some(municipality_id) = municipality_id {
            query = query.filter(item::Column::MunicipalityId.eq(municipality_id));
        }

        query
            .select_only()
            .column(item::Column::Status)
            .column_as(Expr::col(item::Column::Id).count(), "total")
            .group_by(item::Column::Status)
            .into_tuple::<(ItemStatus, i64)>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_item(id: i32, owner: i32, status: ItemStatus) -> item::Model {
        let now = Utc::now();
        item::Model {
            id,
            user_id: owner,
            title: "Rice cooker".to_string(),
            description: "Barely used".to_string(),
            category: "appliances".to_string(),
            condition: item::ItemCondition::LikeNew,
            transaction_type: TransactionKind::Sell,
            price: Some(Decimal::new(50000, 2)),
            lend_duration_days: None,
            security_deposit: None,
            municipality_id: 1,
            barangay_id: Some(3),
            pickup_location: None,
            images: serde_json::json!([]),
            status,
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
    async fn test_get_by_id_returns_item() {
        let item = create_test_item(1, 2, ItemStatus::Available);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[item.clone()]])
                .into_connection(),
        );

        let repo = ItemRepository::new(db);
        let found = repo.get_by_id(1).await.unwrap();

        assert_eq!(found.id, 1);
        assert_eq!(found.price, Some(Decimal::new(500, 0)));
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<item::Model>::new()])
                .into_connection(),
        );

        let repo = ItemRepository::new(db);
        let result = repo.get_by_id(99).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_status_if_reports_lost_race() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let first =
            ItemRepository::set_status_if(&db, 1, ItemStatus::Available, ItemStatus::Reserved)
                .await
                .unwrap();
        let second =
            ItemRepository::set_status_if(&db, 1, ItemStatus::Available, ItemStatus::Reserved)
                .await
                .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_touch_missing_item_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let result = ItemRepository::touch(&db, 5).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_image_paths_ignores_non_strings() {
        let mut item = create_test_item(1, 2, ItemStatus::Available);
        item.images = serde_json::json!(["a.png", 3, "b.jpg"]);
        assert_eq!(item.image_paths(), vec!["a.png", "b.jpg"]);
    }
}
