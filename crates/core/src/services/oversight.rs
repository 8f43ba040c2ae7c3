//! Admin oversight of marketplace transactions.

use chrono::Utc;
use lgu_common::{ActorId, AppError, AppResult, config::MarketplaceConfig};
use lgu_db::{
    entities::{
        item,
        transaction::{self, TransactionStatus},
        transaction_audit_log::{self, AuditAction, AuditActorRole},
    },
    repositories::{ItemRepository, TransactionAuditLogRepository, TransactionRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actor::{Actor, AdminScope};
use crate::services::audit::{AuditEntry, RequestContext};
use crate::services::item::paginate;
use crate::services::notifier::{MarketplaceEvent, NotificationDispatcherService, dispatch_all};
use crate::services::transaction::ItemEffect;

/// Decision an admin records against a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminMarker {
    UnderReview,
    Resolved,
    ConfirmedScam,
}

impl AdminMarker {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnderReview => "under_review",
            Self::Resolved => "resolved",
            Self::ConfirmedScam => "confirmed_scam",
        }
    }
}

/// Input for `mark_status`.
#[derive(Debug, Clone)]
pub struct AdminStatusInput {
    pub marker: AdminMarker,
    pub notes: Option<String>,
}

/// A transaction with its item and ordered audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetail {
    pub transaction: transaction::Model,
    pub item: Option<item::Model>,
    pub audit: Vec<transaction_audit_log::Model>,
}

/// One page of transactions for the admin console.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<(transaction::Model, Option<item::Model>)>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub pages: u64,
}

/// Read and override surface for admins.
#[derive(Clone)]
pub struct OversightService {
    transaction_repo: TransactionRepository,
    item_repo: ItemRepository,
    audit_repo: TransactionAuditLogRepository,
    notifier: NotificationDispatcherService,
    rules: MarketplaceConfig,
}

impl OversightService {
    #[must_use]
    pub const fn new(
        transaction_repo: TransactionRepository,
        item_repo: ItemRepository,
        audit_repo: TransactionAuditLogRepository,
        notifier: NotificationDispatcherService,
        rules: MarketplaceConfig,
    ) -> Self {
        Self {
            transaction_repo,
            item_repo,
            audit_repo,
            notifier,
            rules,
        }
    }

    /// Transactions inside `scope`, newest first.
    pub async fn list(
        &self,
        scope: AdminScope,
        status: Option<TransactionStatus>,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> AppResult<TransactionPage> {
        let (page, per_page, offset) = paginate(page, per_page, self.rules.max_page_size);
        let municipality = scope.municipality_filter();

        let transactions = self
            .transaction_repo
            .list_for_admin(municipality, status, per_page, offset)
            .await?;
        let total = self
            .transaction_repo
            .count_for_admin(municipality, status)
            .await?;

        Ok(TransactionPage {
            transactions,
            total,
            page,
            per_page,
            pages: total.div_ceil(per_page),
        })
    }

    /// One transaction with its timeline.
    pub async fn get(&self, scope: AdminScope, id: i32) -> AppResult<TransactionDetail> {
        let transaction = self.transaction_repo.get_by_id(id).await?;
        let item = self.item_repo.find_by_id(transaction.item_id).await?;
        ensure_in_scope(scope, item.as_ref())?;

        let audit = self.audit_repo.find_by_transaction(id).await?;
        Ok(TransactionDetail {
            transaction,
            item,
            audit,
        })
    }

    /// Record an admin decision.
    ///
    /// `resolved` on a disputed transaction rolls it back to `accepted` and
    /// re-reserves the item when it is still available. Every other marker
    /// leaves the status unchanged.
    pub async fn mark_status(
        &self,
        admin: &Actor,
        scope: AdminScope,
        ctx: &RequestContext,
        id: i32,
        input: AdminStatusInput,
    ) -> AppResult<transaction::Model> {
        let txn = self.transaction_repo.begin().await?;
        let tx = TransactionRepository::get_by_id_in(&txn, id).await?;
        let item = ItemRepository::find_by_id_in(&txn, tx.item_id).await?;
        ensure_in_scope(scope, item.as_ref())?;

        if tx.buyer_id == admin.id.get() || tx.seller_id == admin.id.get() {
            return Err(AppError::ForbiddenRole(
                "Admins cannot rule on their own transactions".to_string(),
            ));
        }

        let rollback =
            input.marker == AdminMarker::Resolved && tx.status == TransactionStatus::Disputed;

        let (updated, action) = if rollback {
            let changes = transaction::ActiveModel {
                status: Set(TransactionStatus::Accepted),
                updated_at: Set(Utc::now()),
                ..Default::default()
            };
            let updated = TransactionRepository::update_if_status(
                &txn,
                tx.id,
                TransactionStatus::Disputed,
                changes,
            )
            .await?;
            ItemEffect::ReserveIfAvailable.apply(&txn, tx.item_id).await?;
            (updated, AuditAction::AdminResolution)
        } else {
            (tx.clone(), AuditAction::AdminStatus)
        };

        AuditEntry::new(tx.id, admin.id, AuditActorRole::Admin, action)
            .statuses(Some(tx.status), Some(updated.status))
            .notes(
                input
                    .notes
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
            )
            .meta("admin_status", input.marker.as_str())
            .record(&txn, ctx)
            .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        info!(
            transaction_id = tx.id,
            admin = %admin.id,
            marker = input.marker.as_str(),
            from = %tx.status,
            to = %updated.status,
            "Admin decision recorded"
        );
        dispatch_all(
            &self.notifier,
            &[ActorId::new(tx.buyer_id), ActorId::new(tx.seller_id)],
            MarketplaceEvent::AdminDecision {
                transaction_id: tx.id,
                marker: input.marker.as_str().to_string(),
            },
        )
        .await;

        Ok(updated)
    }
}

fn ensure_in_scope(scope: AdminScope, item: Option<&item::Model>) -> AppResult<()> {
    match (scope, item) {
        (AdminScope::Province, _) => Ok(()),
        (_, Some(item)) => scope.ensure_covers(item.municipality_id),
        (AdminScope::Municipality(_), None) => Err(AppError::Forbidden(
            "Record is outside your municipality".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_wire_names() {
        for marker in [
            AdminMarker::UnderReview,
            AdminMarker::Resolved,
            AdminMarker::ConfirmedScam,
        ] {
            let json = serde_json::to_value(marker).ok();
            assert_eq!(json, Some(serde_json::Value::from(marker.as_str())));
        }
    }

    #[test]
    fn test_municipal_scope_without_item_is_forbidden() {
        assert!(ensure_in_scope(AdminScope::Municipality(1), None).is_err());
        assert!(ensure_in_scope(AdminScope::Province, None).is_ok());
    }
}
