//! Transaction audit log repository.
//!
//! Append and read only. The timeline of a transaction is ordered by
//! `created_at` with the row id breaking ties.

use std::sync::Arc;

use lgu_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder,
};

use crate::entities::{TransactionAuditLog, transaction_audit_log};

/// Repository for audit log rows.
#[derive(Clone)]
pub struct TransactionAuditLogRepository {
    db: Arc<DatabaseConnection>,
}

impl TransactionAuditLogRepository {
    /// Create a new audit log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append a row on the given connection or transaction.
    pub async fn append_in<C: ConnectionTrait>(
        conn: &C,
        model: transaction_audit_log::ActiveModel,
    ) -> AppResult<transaction_audit_log::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Ordered timeline for a transaction.
    pub async fn find_by_transaction(
        &self,
        transaction_id: i32,
    ) -> AppResult<Vec<transaction_audit_log::Model>> {
        TransactionAuditLog::find()
            .filter(transaction_audit_log::Column::TransactionId.eq(transaction_id))
            .order_by(transaction_audit_log::Column::CreatedAt, Order::Asc)
            .order_by(transaction_audit_log::Column::Id, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of rows recorded for a transaction.
    pub async fn count_by_transaction(&self, transaction_id: i32) -> AppResult<u64> {
        TransactionAuditLog::find()
            .filter(transaction_audit_log::Column::TransactionId.eq(transaction_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
