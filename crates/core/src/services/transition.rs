//! Transaction transition table and guards.
//!
//! Every party-driven status change is described by a [`TransitionRule`].
//! Checks run in a fixed order: the party check first, then the status
//! check, then the kind check. A caller who is not the required party
//! therefore always gets `ForbiddenRole`, whatever state the transaction
//! is in.

use lgu_common::{ActorId, AppError, AppResult};
use lgu_db::entities::{
    item::TransactionKind,
    transaction::{self, TransactionStatus},
    transaction_audit_log::{AuditAction, AuditActorRole},
};

/// A party-driven operation on an existing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionAction {
    SellerPropose,
    BuyerConfirm,
    BuyerReject,
    SellerReject,
    HandoverSeller,
    HandoverBuyer,
    ReturnBuyer,
    ReturnSeller,
    Complete,
    Dispute,
}

impl TransactionAction {
    pub const ALL: [Self; 10] = [
        Self::SellerPropose,
        Self::BuyerConfirm,
        Self::BuyerReject,
        Self::SellerReject,
        Self::HandoverSeller,
        Self::HandoverBuyer,
        Self::ReturnBuyer,
        Self::ReturnSeller,
        Self::Complete,
        Self::Dispute,
    ];
}

/// Who may perform an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Buyer,
    Seller,
    Either,
}

/// Which transaction kinds an action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindScope {
    Any,
    LendOnly,
    NotLend,
}

impl KindScope {
    #[must_use]
    pub const fn allows(self, kind: TransactionKind) -> bool {
        match self {
            Self::Any => true,
            Self::LendOnly => matches!(kind, TransactionKind::Lend),
            Self::NotLend => !matches!(kind, TransactionKind::Lend),
        }
    }
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub action: TransactionAction,
    pub party: Party,
    pub from: &'static [TransactionStatus],
    pub to: TransactionStatus,
    pub kinds: KindScope,
    pub audit: AuditAction,
}

use TransactionStatus as S;

/// Statuses from which either party may raise a dispute.
pub const DISPUTABLE: &[TransactionStatus] = &[
    S::Pending,
    S::AwaitingBuyer,
    S::Accepted,
    S::HandedOver,
    S::Received,
    S::Returned,
];

/// The transition table.
pub const RULES: &[TransitionRule] = &[
    TransitionRule {
        action: TransactionAction::SellerPropose,
        party: Party::Seller,
        from: &[S::Pending, S::AwaitingBuyer],
        to: S::AwaitingBuyer,
        kinds: KindScope::Any,
        audit: AuditAction::Propose,
    },
    TransitionRule {
        action: TransactionAction::BuyerConfirm,
        party: Party::Buyer,
        from: &[S::AwaitingBuyer],
        to: S::Accepted,
        kinds: KindScope::Any,
        audit: AuditAction::Confirm,
    },
    TransitionRule {
        action: TransactionAction::BuyerReject,
        party: Party::Buyer,
        from: &[S::AwaitingBuyer],
        to: S::Rejected,
        kinds: KindScope::Any,
        audit: AuditAction::RejectBuyer,
    },
    TransitionRule {
        action: TransactionAction::SellerReject,
        party: Party::Seller,
        from: &[S::Pending, S::AwaitingBuyer],
        to: S::Rejected,
        kinds: KindScope::Any,
        audit: AuditAction::RejectSeller,
    },
    TransitionRule {
        action: TransactionAction::HandoverSeller,
        party: Party::Seller,
        from: &[S::Accepted],
        to: S::HandedOver,
        kinds: KindScope::Any,
        audit: AuditAction::HandoverSeller,
    },
    TransitionRule {
        action: TransactionAction::HandoverBuyer,
        party: Party::Buyer,
        from: &[S::HandedOver],
        to: S::Received,
        kinds: KindScope::Any,
        audit: AuditAction::HandoverBuyer,
    },
    TransitionRule {
        action: TransactionAction::ReturnBuyer,
        party: Party::Buyer,
        from: &[S::Received],
        to: S::Returned,
        kinds: KindScope::LendOnly,
        audit: AuditAction::ReturnBuyer,
    },
    TransitionRule {
        action: TransactionAction::ReturnSeller,
        party: Party::Seller,
        from: &[S::Returned],
        to: S::Completed,
        kinds: KindScope::LendOnly,
        audit: AuditAction::ReturnSeller,
    },
    TransitionRule {
        action: TransactionAction::Complete,
        party: Party::Either,
        from: &[S::Received],
        to: S::Completed,
        kinds: KindScope::NotLend,
        audit: AuditAction::Complete,
    },
    TransitionRule {
        action: TransactionAction::Dispute,
        party: Party::Either,
        from: DISPUTABLE,
        to: S::Disputed,
        kinds: KindScope::Any,
        audit: AuditAction::Dispute,
    },
];

/// Look up the rule for an action.
pub fn rule(action: TransactionAction) -> AppResult<&'static TransitionRule> {
    RULES
        .iter()
        .find(|r| r.action == action)
        .ok_or_else(|| AppError::Internal(format!("No transition rule for {action:?}")))
}

/// Ensure `actor` is the required party and return the capacity they act in.
pub fn require_role(
    tx: &transaction::Model,
    actor: ActorId,
    party: Party,
) -> AppResult<AuditActorRole> {
    let is_buyer = tx.buyer_id == actor.get();
    let is_seller = tx.seller_id == actor.get();

    match party {
        Party::Buyer if is_buyer => Ok(AuditActorRole::Buyer),
        Party::Seller if is_seller => Ok(AuditActorRole::Seller),
        Party::Either if is_buyer => Ok(AuditActorRole::Buyer),
        Party::Either if is_seller => Ok(AuditActorRole::Seller),
        Party::Buyer => Err(AppError::ForbiddenRole(
            "Only the buyer can perform this action".to_string(),
        )),
        Party::Seller => Err(AppError::ForbiddenRole(
            "Only the seller can perform this action".to_string(),
        )),
        Party::Either => Err(AppError::ForbiddenRole(
            "Only the buyer or seller can perform this action".to_string(),
        )),
    }
}

/// Ensure the transaction is currently in one of `allowed`.
pub fn assert_status(tx: &transaction::Model, allowed: &[TransactionStatus]) -> AppResult<()> {
    if allowed.contains(&tx.status) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "Transaction cannot transition from {}",
            tx.status
        )))
    }
}

impl TransitionRule {
    /// Run the guards in order and return the actor's capacity.
    pub fn check(&self, tx: &transaction::Model, actor: ActorId) -> AppResult<AuditActorRole> {
        let role = require_role(tx, actor, self.party)?;
        assert_status(tx, self.from)?;
        if !self.kinds.allows(tx.transaction_type) {
            return Err(AppError::InvalidTransition(format!(
                "Action not available for {} transactions",
                tx.transaction_type.as_str()
            )));
        }
        Ok(role)
    }
}
