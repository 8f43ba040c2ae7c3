//! Transaction repository.

use std::sync::Arc;

use lgu_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, JoinType, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, TransactionTrait,
};

use crate::entities::{
    Item, Transaction, item,
    transaction::{self, TransactionStatus},
};

/// Repository for transaction operations.
#[derive(Clone)]
pub struct TransactionRepository {
    db: Arc<DatabaseConnection>,
}

impl TransactionRepository {
    /// Create a new transaction repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Open a unit of work. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a transaction by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<transaction::Model>> {
        Self::find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find a transaction by ID on the given connection or transaction.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> AppResult<Option<transaction::Model>> {
        Transaction::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a transaction by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i32) -> AppResult<transaction::Model> {
        Self::get_by_id_in(self.db.as_ref(), id).await
    }

    /// Get a transaction by ID on the given connection or transaction.
    pub async fn get_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> AppResult<transaction::Model> {
        Self::find_by_id_in(conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction not found: {id}")))
    }

    /// Insert a new transaction.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        model: transaction::ActiveModel,
    ) -> AppResult<transaction::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether the item has a transaction that has not reached a terminal status.
    pub async fn has_open_for_item<C: ConnectionTrait>(conn: &C, item_id: i32) -> AppResult<bool> {
        let count = Transaction::find()
            .filter(transaction::Column::ItemId.eq(item_id))
            .filter(transaction::Column::Status.is_not_in(TransactionStatus::TERMINAL))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Apply `changes` only while the row is still in `expected`.
    ///
    /// A concurrent writer that already moved the row makes this fail with
    /// [`AppError::Conflict`]. Returns the row as stored after the update.
    pub async fn update_if_status<C: ConnectionTrait>(
        conn: &C,
        id: i32,
        expected: TransactionStatus,
        changes: transaction::ActiveModel,
    ) -> AppResult<transaction::Model> {
        let result = Transaction::update_many()
            .set(changes)
            .filter(transaction::Column::Id.eq(id))
            .filter(transaction::Column::Status.eq(expected))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::Conflict(format!(
                "Transaction {id} changed concurrently"
            )));
        }

        Self::get_by_id_in(conn, id).await
    }

    /// Transactions where the user is the buyer, newest first.
    pub async fn find_by_buyer(&self, buyer_id: i32) -> AppResult<Vec<transaction::Model>> {
        Transaction::find()
            .filter(transaction::Column::BuyerId.eq(buyer_id))
            .order_by(transaction::Column::CreatedAt, Order::Desc)
            .order_by(transaction::Column::Id, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Transactions where the user is the seller, newest first.
    pub async fn find_by_seller(&self, seller_id: i32) -> AppResult<Vec<transaction::Model>> {
        Transaction::find()
            .filter(transaction::Column::SellerId.eq(seller_id))
            .order_by(transaction::Column::CreatedAt, Order::Desc)
            .order_by(transaction::Column::Id, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn admin_query(
        municipality_id: Option<i32>,
        status: Option<TransactionStatus>,
    ) -> Select<Transaction> {
        let mut query = Transaction::find();
        if let Some(municipality_id) = municipality_id {
            query = query
                .join(JoinType::InnerJoin, transaction::Relation::Item.def())
                .filter(item::Column::MunicipalityId.eq(municipality_id));
        }
        if let Some(status) = status {
            query = query.filter(transaction::Column::Status.eq(status));
        }
        query
    }

    /// Transactions visible to an admin, newest first, with their items.
    pub async fn list_for_admin(
        &self,
        municipality_id: Option<i32>,
        status: Option<TransactionStatus>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<(transaction::Model, Option<item::Model>)>> {
        let transactions = Self::admin_query(municipality_id, status)
            .order_by(transaction::Column::CreatedAt, Order::Desc)
            .order_by(transaction::Column::Id, Order::Desc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let item_ids: Vec<i32> = transactions.iter().map(|t| t.item_id).collect();
        let items = if item_ids.is_empty() {
            Vec::new()
        } else {
            Item::find()
                .filter(item::Column::Id.is_in(item_ids))
                .all(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
        };

        Ok(transactions
            .into_iter()
            .map(|tx| {
                let item = items.iter().find(|i| i.id == tx.item_id).cloned();
                (tx, item)
            })
            .collect())
    }

    /// Count transactions visible to an admin.
    pub async fn count_for_admin(
        &self,
        municipality_id: Option<i32>,
        status: Option<TransactionStatus>,
    ) -> AppResult<u64> {
        Self::admin_query(municipality_id, status)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_transaction(id: i32, status: TransactionStatus) -> transaction::Model {
        let now = Utc::now();
        transaction::Model {
            id,
            item_id: 10,
            buyer_id: 1,
            seller_id: 2,
            transaction_type: transaction::TransactionKind::Donate,
            status,
            amount: None,
            borrow_start_date: None,
            borrow_end_date: None,
            return_date: None,
            pickup_at: None,
            pickup_location: None,
            buyer_notes: None,
            seller_notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<transaction::Model>::new()])
                .into_connection(),
        );

        let repo = TransactionRepository::new(db);
        let result = repo.get_by_id(404).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_if_status_returns_updated_row() {
        let updated = create_test_transaction(1, TransactionStatus::AwaitingBuyer);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([[updated.clone()]])
            .into_connection();

        let changes = transaction::ActiveModel {
            status: Set(TransactionStatus::AwaitingBuyer),
            ..Default::default()
        };
        let result =
            TransactionRepository::update_if_status(&db, 1, TransactionStatus::Pending, changes)
                .await
                .unwrap();

        assert_eq!(result.status, TransactionStatus::AwaitingBuyer);
    }

    #[tokio::test]
    async fn test_update_if_status_conflict_when_no_rows_match() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let changes = transaction::ActiveModel {
            status: Set(TransactionStatus::Accepted),
            ..Default::default()
        };
        let result = TransactionRepository::update_if_status(
            &db,
            1,
            TransactionStatus::AwaitingBuyer,
            changes,
        )
        .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_find_by_buyer() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_transaction(2, TransactionStatus::Pending),
                    create_test_transaction(1, TransactionStatus::Completed),
                ]])
                .into_connection(),
        );

        let repo = TransactionRepository::new(db);
        let found = repo.find_by_buyer(1).await.unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|t| t.buyer_id == 1));
    }
}
