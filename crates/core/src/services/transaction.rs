//! Transaction state machine service.
//!
//! Every operation runs as one unit of work: load, guard, conditional
//! status update, item side effect, audit row, commit. Notifications are
//! sent only after the commit succeeded.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use lgu_common::{ActorId, AppError, AppResult, config::MarketplaceConfig};
use lgu_db::{
    entities::{
        item::{self, ItemStatus, TransactionKind},
        transaction::{self, TransactionStatus},
        transaction_audit_log::{self, AuditAction, AuditActorRole},
    },
    repositories::{ItemRepository, TransactionAuditLogRepository, TransactionRepository},
};
use sea_orm::{ConnectionTrait, DatabaseTransaction, Set};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::actor::Actor;
use crate::services::audit::{AuditEntry, RequestContext};
use crate::services::notifier::{MarketplaceEvent, NotificationDispatcherService, dispatch_all};
use crate::services::transition::{self, TransactionAction};

/// Input for requesting an item.
#[derive(Debug, Clone)]
pub struct ProposeInput {
    pub item_id: i32,
    pub notes: Option<String>,
}

/// Input for the seller's pickup proposal.
#[derive(Debug, Clone)]
pub struct ProposePickupInput {
    /// ISO-8601 timestamp. Values without an offset are read as UTC.
    pub pickup_at: String,
    pub pickup_location: String,
    pub notes: Option<String>,
}

/// Free-form note attached to a transition.
#[derive(Debug, Clone, Default)]
pub struct NotesInput {
    pub notes: Option<String>,
}

/// Input for raising a dispute.
#[derive(Debug, Clone, Default)]
pub struct DisputeInput {
    pub reason: Option<String>,
}

/// The caller's transactions split by side.
#[derive(Debug, Clone, Serialize)]
pub struct MyTransactions {
    pub as_buyer: Vec<transaction::Model>,
    pub as_seller: Vec<transaction::Model>,
}

/// What a transition does to the item row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemEffect {
    Unchanged,
    /// `available -> reserved`, failing when the item is not available.
    Reserve,
    /// `available -> reserved` when possible, otherwise left alone.
    ReserveIfAvailable,
    /// Back to `available` if the listing is still active.
    Release,
    /// Back to `available` and active again.
    Relist,
    /// `completed` and inactive.
    Retire,
}

impl ItemEffect {
    pub(crate) async fn apply<C: ConnectionTrait>(self, conn: &C, item_id: i32) -> AppResult<()> {
        match self {
            Self::Unchanged => Ok(()),
            Self::Reserve => {
                let reserved = ItemRepository::set_status_if(
                    conn,
                    item_id,
                    ItemStatus::Available,
                    ItemStatus::Reserved,
                )
                .await?;
                if reserved {
                    Ok(())
                } else {
                    Err(AppError::ItemNotAvailable(
                        "Item is no longer available".to_string(),
                    ))
                }
            }
            Self::ReserveIfAvailable => {
                ItemRepository::set_status_if(
                    conn,
                    item_id,
                    ItemStatus::Available,
                    ItemStatus::Reserved,
                )
                .await?;
                Ok(())
            }
            Self::Release | Self::Relist | Self::Retire => {
                let Some(item) = ItemRepository::find_by_id_in(conn, item_id).await? else {
                    return Ok(());
                };
                if self == Self::Release && !item.is_active {
                    return Ok(());
                }

                let mut active: item::ActiveModel = item.into();
                match self {
                    Self::Retire => {
                        active.status = Set(ItemStatus::Completed);
                        active.is_active = Set(false);
                        active.completed_at = Set(Some(Utc::now()));
                    }
                    _ => {
                        active.status = Set(ItemStatus::Available);
                        active.is_active = Set(true);
                    }
                }
                ItemRepository::update_in(conn, active).await?;
                Ok(())
            }
        }
    }
}

/// Planned changes for one transition, computed after the guards passed.
struct Step {
    changes: transaction::ActiveModel,
    effect: ItemEffect,
    notes: Option<String>,
    metadata: Vec<(&'static str, Value)>,
}

impl Step {
    fn new(effect: ItemEffect) -> Self {
        Self {
            changes: transaction::ActiveModel::default(),
            effect,
            notes: None,
            metadata: Vec::new(),
        }
    }

    fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = clean_notes(notes);
        self
    }

    fn meta(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.metadata.push((key, value.into()));
        self
    }
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Parse a pickup timestamp. Naive timestamps are taken as UTC.
pub fn parse_pickup_at(raw: &str) -> AppResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(AppError::Validation(format!(
        "pickup_at is not a valid ISO-8601 timestamp: {raw}"
    )))
}

const fn counterparty(tx: &transaction::Model, role: AuditActorRole) -> ActorId {
    match role {
        AuditActorRole::Buyer => ActorId::new(tx.seller_id),
        _ => ActorId::new(tx.buyer_id),
    }
}

async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
    txn.commit()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Transaction lifecycle service.
#[derive(Clone)]
pub struct TransactionService {
    transaction_repo: TransactionRepository,
    item_repo: ItemRepository,
    audit_repo: TransactionAuditLogRepository,
    notifier: NotificationDispatcherService,
    rules: MarketplaceConfig,
}

impl TransactionService {
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

    /// Buyer requests an item, opening a `pending` transaction.
    pub async fn propose(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        input: ProposeInput,
    ) -> AppResult<transaction::Model> {
        actor.require_fully_verified()?;

        let txn = self.transaction_repo.begin().await?;

        // Locks the item row so concurrent requests serialize here.
        ItemRepository::touch(&txn, input.item_id).await?;
        let item = ItemRepository::get_by_id_in(&txn, input.item_id).await?;

        if !item.is_active || item.status != ItemStatus::Available {
            return Err(AppError::ItemNotAvailable(
                "Item is not available".to_string(),
            ));
        }
        if item.user_id == actor.id.get() {
            return Err(AppError::SelfTransactionForbidden);
        }
        if actor.municipality_id != Some(item.municipality_id) {
            return Err(AppError::LocationMismatch(
                "You can only transact on items in your municipality".to_string(),
            ));
        }
        if TransactionRepository::has_open_for_item(&txn, item.id).await? {
            return Err(AppError::DuplicateRequest(
                "Item already has an open transaction".to_string(),
            ));
        }

        let now = Utc::now();
        let notes = clean_notes(input.notes);
        let created = TransactionRepository::create_in(
            &txn,
            transaction::ActiveModel {
                item_id: Set(item.id),
                buyer_id: Set(actor.id.get()),
                seller_id: Set(item.user_id),
                transaction_type: Set(item.transaction_type),
                status: Set(TransactionStatus::Pending),
                amount: Set(match item.transaction_type {
                    TransactionKind::Sell => item.price,
                    TransactionKind::Donate | TransactionKind::Lend => None,
                }),
                buyer_notes: Set(notes.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            },
        )
        .await?;

        AuditEntry::new(created.id, actor.id, AuditActorRole::Buyer, AuditAction::Request)
            .statuses(None, Some(TransactionStatus::Pending))
            .notes(notes)
            .meta("item_id", item.id)
            .record(&txn, ctx)
            .await?;

        commit(txn).await?;

        info!(
            transaction_id = created.id,
            item_id = item.id,
            buyer = %actor.id,
            seller = created.seller_id,
            "Transaction requested"
        );
        dispatch_all(
            &self.notifier,
            &[ActorId::new(created.seller_id)],
            MarketplaceEvent::TransactionRequested {
                transaction_id: created.id,
                item_id: item.id,
                buyer_id: actor.id,
            },
        )
        .await;

        Ok(created)
    }

    /// Seller proposes when and where the pickup happens.
    pub async fn propose_pickup(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: ProposePickupInput,
    ) -> AppResult<transaction::Model> {
        self.pickup_proposal(actor, ctx, id, input, false).await
    }

    /// Older clients call "accept"; it behaves exactly like a pickup proposal.
    pub async fn accept_legacy(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: ProposePickupInput,
    ) -> AppResult<transaction::Model> {
        self.pickup_proposal(actor, ctx, id, input, true).await
    }

    async fn pickup_proposal(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: ProposePickupInput,
        legacy: bool,
    ) -> AppResult<transaction::Model> {
        let lead = Duration::minutes(self.rules.min_pickup_lead_minutes);

        self.run(actor, ctx, id, TransactionAction::SellerPropose, move |_, _, _| {
            let pickup_at = parse_pickup_at(&input.pickup_at)?;
            if pickup_at < Utc::now() + lead {
                return Err(AppError::Validation(format!(
                    "pickup_at must be at least {} minutes from now",
                    lead.num_minutes()
                )));
            }
            let location = input.pickup_location.trim().to_string();
            if location.is_empty() {
                return Err(AppError::Validation(
                    "pickup_location is required".to_string(),
                ));
            }

            let notes = clean_notes(input.notes);
            let mut step = Step::new(ItemEffect::Unchanged)
                .notes(notes.clone())
                .meta("pickup_at", pickup_at.to_rfc3339())
                .meta("pickup_location", location.clone());
            if legacy {
                step = step.meta("via", "legacy_accept");
            }
            step.changes.pickup_at = Set(Some(pickup_at));
            step.changes.pickup_location = Set(Some(location));
            if notes.is_some() {
                step.changes.seller_notes = Set(notes);
            }
            Ok(step)
        })
        .await
    }

    /// Buyer agrees to the pickup proposal and the item is reserved.
    pub async fn confirm(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: NotesInput,
    ) -> AppResult<transaction::Model> {
        self.run(actor, ctx, id, TransactionAction::BuyerConfirm, |tx, _, _| {
            if tx.pickup_at.is_none() || tx.pickup_location.is_none() {
                return Err(AppError::BadRequest(
                    "The seller has not proposed a pickup yet".to_string(),
                ));
            }
            let notes = clean_notes(input.notes);
            let mut step = Step::new(ItemEffect::Reserve).notes(notes.clone());
            if notes.is_some() {
                step.changes.buyer_notes = Set(notes);
            }
            Ok(step)
        })
        .await
    }

    /// Buyer declines the pickup proposal.
    pub async fn reject_as_buyer(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: NotesInput,
    ) -> AppResult<transaction::Model> {
        self.run(actor, ctx, id, TransactionAction::BuyerReject, |_, _, _| {
            let notes = clean_notes(input.notes);
            let mut step = Step::new(ItemEffect::Release).notes(notes.clone());
            if notes.is_some() {
                step.changes.buyer_notes = Set(notes);
            }
            Ok(step)
        })
        .await
    }

    /// Seller declines the request.
    pub async fn reject_as_seller(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: NotesInput,
    ) -> AppResult<transaction::Model> {
        self.run(actor, ctx, id, TransactionAction::SellerReject, |_, _, _| {
            let notes = clean_notes(input.notes);
            let mut step = Step::new(ItemEffect::Release).notes(notes.clone());
            if notes.is_some() {
                step.changes.seller_notes = Set(notes);
            }
            Ok(step)
        })
        .await
    }

    /// Seller marks the item as handed over.
    pub async fn handover_seller(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: NotesInput,
    ) -> AppResult<transaction::Model> {
        self.run(actor, ctx, id, TransactionAction::HandoverSeller, |tx, item, _| {
            let mut step = Step::new(ItemEffect::Unchanged).notes(input.notes);
            if tx.transaction_type == TransactionKind::Lend {
                let start = tx.borrow_start_date.unwrap_or_else(Utc::now);
                step.changes.borrow_start_date = Set(Some(start));
                if let Some(days) = item.and_then(|i| i.lend_duration_days) {
                    let end = start
                        .checked_add_signed(Duration::days(i64::from(days)))
                        .ok_or_else(|| {
                            AppError::Validation(format!(
                                "lend_duration_days of {days} is out of range"
                            ))
                        })?;
                    step.changes.borrow_end_date = Set(Some(end));
                }
            }
            Ok(step)
        })
        .await
    }

    /// Buyer acknowledges receipt.
    pub async fn handover_buyer(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: NotesInput,
    ) -> AppResult<transaction::Model> {
        self.run(actor, ctx, id, TransactionAction::HandoverBuyer, |tx, _, _| {
            let mut step = Step::new(ItemEffect::Unchanged).notes(input.notes);
            if tx.transaction_type == TransactionKind::Lend && tx.borrow_start_date.is_none() {
                step.changes.borrow_start_date = Set(Some(Utc::now()));
            }
            Ok(step)
        })
        .await
    }

    /// Borrower hands a lent item back.
    pub async fn return_buyer(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: NotesInput,
    ) -> AppResult<transaction::Model> {
        self.run(actor, ctx, id, TransactionAction::ReturnBuyer, |_, _, _| {
            let mut step = Step::new(ItemEffect::Unchanged).notes(input.notes);
            step.changes.return_date = Set(Some(Utc::now()));
            Ok(step)
        })
        .await
    }

    /// Lender confirms the return; the item goes back on the market.
    pub async fn return_seller(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: NotesInput,
    ) -> AppResult<transaction::Model> {
        self.run(actor, ctx, id, TransactionAction::ReturnSeller, |_, _, _| {
            let mut step = Step::new(ItemEffect::Relist).notes(input.notes);
            step.changes.completed_at = Set(Some(Utc::now()));
            Ok(step)
        })
        .await
    }

    /// Either party closes a sale or donation.
    pub async fn complete(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: NotesInput,
    ) -> AppResult<transaction::Model> {
        self.run(actor, ctx, id, TransactionAction::Complete, |_, _, _| {
            let mut step = Step::new(ItemEffect::Retire).notes(input.notes);
            step.changes.completed_at = Set(Some(Utc::now()));
            Ok(step)
        })
        .await
    }

    /// Either party reports a problem.
    pub async fn dispute(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        input: DisputeInput,
    ) -> AppResult<transaction::Model> {
        self.run(actor, ctx, id, TransactionAction::Dispute, |tx, _, role| {
            Ok(Step::new(ItemEffect::Unchanged)
                .notes(input.reason)
                .meta("reported_user_id", counterparty(tx, role).get()))
        })
        .await
    }

    async fn run<F>(
        &self,
        actor: &Actor,
        ctx: &RequestContext,
        id: i32,
        action: TransactionAction,
        plan: F,
    ) -> AppResult<transaction::Model>
    where
        F: FnOnce(&transaction::Model, Option<&item::Model>, AuditActorRole) -> AppResult<Step>,
    {
        actor.require_fully_verified()?;
        let rule = transition::rule(action)?;

        let txn = self.transaction_repo.begin().await?;
        let tx = TransactionRepository::get_by_id_in(&txn, id).await?;
        let role = rule.check(&tx, actor.id)?;
        let item = ItemRepository::find_by_id_in(&txn, tx.item_id).await?;

        let mut step = plan(&tx, item.as_ref(), role)?;
        step.changes.status = Set(rule.to);
        step.changes.updated_at = Set(Utc::now());

        let updated =
            TransactionRepository::update_if_status(&txn, tx.id, tx.status, step.changes).await?;
        step.effect.apply(&txn, tx.item_id).await?;

        let mut entry = AuditEntry::new(tx.id, actor.id, role, rule.audit)
            .statuses(Some(tx.status), Some(rule.to))
            .notes(step.notes);
        for (key, value) in step.metadata {
            entry = entry.meta(key, value);
        }
        entry.record(&txn, ctx).await?;

        commit(txn).await?;

        info!(
            transaction_id = tx.id,
            actor = %actor.id,
            action = ?action,
            from = %tx.status,
            to = %rule.to,
            "Transaction transition"
        );

        let event = if action == TransactionAction::Dispute {
            MarketplaceEvent::DisputeRaised {
                transaction_id: tx.id,
                reporter_id: actor.id,
            }
        } else {
            MarketplaceEvent::StatusChanged {
                transaction_id: tx.id,
                from: tx.status,
                to: rule.to,
                actor_id: actor.id,
            }
        };
        dispatch_all(&self.notifier, &[counterparty(&tx, role)], event).await;

        Ok(updated)
    }

    /// The caller's transactions as buyer and as seller.
    pub async fn my_transactions(&self, actor: &Actor) -> AppResult<MyTransactions> {
        Ok(MyTransactions {
            as_buyer: self.transaction_repo.find_by_buyer(actor.id.get()).await?,
            as_seller: self.transaction_repo.find_by_seller(actor.id.get()).await?,
        })
    }

    /// Snapshot and audit timeline, visible to the parties and in-scope admins.
    pub async fn audit_timeline(
        &self,
        actor: &Actor,
        id: i32,
    ) -> AppResult<(transaction::Model, Vec<transaction_audit_log::Model>)> {
        let tx = self.transaction_repo.get_by_id(id).await?;

        let is_party = tx.buyer_id == actor.id.get() || tx.seller_id == actor.id.get();
        if !is_party {
            let in_scope = match actor.admin_scope() {
                Ok(scope) => self
                    .item_repo
                    .find_by_id(tx.item_id)
                    .await?
                    .map_or(scope.municipality_filter().is_none(), |i| {
                        scope.covers(i.municipality_id)
                    }),
                Err(_) => false,
            };
            if !in_scope {
                return Err(AppError::ForbiddenRole(
                    "Only the parties or an admin can view this audit trail".to_string(),
                ));
            }
        }

        let timeline = self.audit_repo.find_by_transaction(tx.id).await?;
        Ok((tx, timeline))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_pickup_at_with_offset() {
        let at = parse_pickup_at("2026-03-01T10:00:00+08:00").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_pickup_at_naive_is_utc() {
        let at = parse_pickup_at("2026-03-01T10:00:00").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap());

        let at = parse_pickup_at("2026-03-01 10:30").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_pickup_at_rejects_garbage() {
        assert!(matches!(
            parse_pickup_at("tomorrow"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_clean_notes() {
        assert_eq!(clean_notes(Some("  ".to_string())), None);
        assert_eq!(clean_notes(Some(" ok ".to_string())).as_deref(), Some("ok"));
    }
}
