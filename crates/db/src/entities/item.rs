//! Marketplace item entity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How an item changes hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    #[sea_orm(string_value = "donate")]
    Donate,
    #[sea_orm(string_value = "lend")]
    Lend,
    #[sea_orm(string_value = "sell")]
    Sell,
}

impl TransactionKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Donate => "donate",
            Self::Lend => "lend",
            Self::Sell => "sell",
        }
    }
}

/// Physical condition of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "like_new")]
    LikeNew,
    #[sea_orm(string_value = "good")]
    Good,
    #[sea_orm(string_value = "fair")]
    Fair,
    #[sea_orm(string_value = "poor")]
    Poor,
}

/// Listing status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Awaiting moderation.
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Listed and open to proposals.
    #[sea_orm(string_value = "available")]
    Available,
    /// Held by an accepted transaction.
    #[sea_orm(string_value = "reserved")]
    Reserved,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Item model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Owner of the listing.
    pub user_id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub category: String,
    pub condition: ItemCondition,
    pub transaction_type: TransactionKind,
    /// Asking price, only set for `sell` items.
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub price: Option<Decimal>,
    pub lend_duration_days: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub security_deposit: Option<Decimal>,
    pub municipality_id: i32,
    pub barangay_id: Option<i32>,
    pub pickup_location: Option<String>,
    /// JSON array of stored image paths.
    pub images: Json,
    pub status: ItemStatus,
    pub is_active: bool,
    pub approved_by: Option<i32>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<i32>,
    pub rejected_at: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Stored image paths.
    #[must_use]
    pub fn image_paths(&self) -> Vec<String> {
        self.images
            .as_array()
            .map(|images| {
                images
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
