//! Marketplace transaction entity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::item::TransactionKind;

/// Lifecycle status of a transaction.
///
/// `pending -> awaiting_buyer -> accepted -> handed_over -> received`,
/// then `returned -> completed` for loans or straight to `completed`
/// otherwise. `rejected`, `cancelled` and `disputed` are side branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "awaiting_buyer")]
    AwaitingBuyer,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "handed_over")]
    HandedOver,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "disputed")]
    Disputed,
}

impl TransactionStatus {
    /// Statuses a transaction never leaves.
    pub const TERMINAL: [Self; 3] = [Self::Completed, Self::Rejected, Self::Cancelled];

    /// Whether the transaction has reached the end of its lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingBuyer => "awaiting_buyer",
            Self::Accepted => "accepted",
            Self::HandedOver => "handed_over",
            Self::Received => "received",
            Self::Returned => "returned",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Disputed => "disputed",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub item_id: i32,
    /// Receiving party (buyer, borrower or donee).
    pub buyer_id: i32,
    /// Giving party, always the item owner.
    pub seller_id: i32,
    pub transaction_type: TransactionKind,
    pub status: TransactionStatus,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub amount: Option<Decimal>,
    pub borrow_start_date: Option<DateTime<Utc>>,
    pub borrow_end_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub pickup_at: Option<DateTime<Utc>>,
    pub pickup_location: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub buyer_notes: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub seller_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,

    #[sea_orm(has_many = "super::transaction_audit_log::Entity")]
    AuditLog,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl Related<super::transaction_audit_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuditLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_terminal_statuses() {
        for status in TransactionStatus::iter() {
            assert_eq!(
                status.is_terminal(),
                TransactionStatus::TERMINAL.contains(&status),
                "{status}"
            );
        }
        assert!(!TransactionStatus::Disputed.is_terminal());
    }

    #[test]
    fn test_as_str_matches_stored_value() {
        for status in TransactionStatus::iter() {
            assert_eq!(status.as_str(), status.to_value());
        }
    }
}
