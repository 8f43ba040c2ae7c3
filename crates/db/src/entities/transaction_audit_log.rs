//! Transaction audit log entity.
//!
//! Rows are append-only; nothing in the crate updates or deletes them.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::transaction::TransactionStatus;

/// Capacity in which the actor performed the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum AuditActorRole {
    #[sea_orm(string_value = "buyer")]
    Buyer,
    #[sea_orm(string_value = "seller")]
    Seller,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "system")]
    System,
}

/// Recorded action verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Buyer opened the transaction.
    #[sea_orm(string_value = "request")]
    Request,
    #[sea_orm(string_value = "propose")]
    Propose,
    #[sea_orm(string_value = "confirm")]
    Confirm,
    #[sea_orm(string_value = "reject_buyer")]
    RejectBuyer,
    #[sea_orm(string_value = "reject_seller")]
    RejectSeller,
    #[sea_orm(string_value = "handover_seller")]
    HandoverSeller,
    #[sea_orm(string_value = "handover_buyer")]
    HandoverBuyer,
    #[sea_orm(string_value = "return_buyer")]
    ReturnBuyer,
    #[sea_orm(string_value = "return_seller")]
    ReturnSeller,
    #[sea_orm(string_value = "complete")]
    Complete,
    #[sea_orm(string_value = "dispute")]
    Dispute,
    /// Admin marker that leaves the status untouched.
    #[sea_orm(string_value = "admin_status")]
    AdminStatus,
    /// Admin rolled a disputed transaction back to `accepted`.
    #[sea_orm(string_value = "admin_resolution")]
    AdminResolution,
}

/// Audit log model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub transaction_id: i32,
    /// Absent for system actions.
    pub actor_id: Option<i32>,
    pub actor_role: AuditActorRole,
    pub action: AuditAction,
    pub from_status: Option<TransactionStatus>,
    pub to_status: Option<TransactionStatus>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id"
    )]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
