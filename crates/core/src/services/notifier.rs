//! Notification dispatch.
//!
//! Services announce marketplace events through this trait after their unit
//! of work has committed. Delivery is fire-and-forget: a failed dispatch is
//! logged by the caller and never undoes the state change.

use std::sync::Arc;

use async_trait::async_trait;
use lgu_common::{ActorId, AppResult};
use lgu_db::entities::transaction::TransactionStatus;
use tracing::info;

/// Event delivered to a marketplace participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceEvent {
    /// A buyer asked for an item.
    TransactionRequested {
        transaction_id: i32,
        item_id: i32,
        buyer_id: ActorId,
    },
    /// A transaction moved to a new status.
    StatusChanged {
        transaction_id: i32,
        from: TransactionStatus,
        to: TransactionStatus,
        actor_id: ActorId,
    },
    /// A party raised a dispute.
    DisputeRaised {
        transaction_id: i32,
        reporter_id: ActorId,
    },
    /// An admin recorded a decision.
    AdminDecision {
        transaction_id: i32,
        marker: String,
    },
    /// An admin approved or rejected a listing.
    ItemModerated { item_id: i32, approved: bool },
}

impl MarketplaceEvent {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TransactionRequested { .. } => "transaction_requested",
            Self::StatusChanged { .. } => "status_changed",
            Self::DisputeRaised { .. } => "dispute_raised",
            Self::AdminDecision { .. } => "admin_decision",
            Self::ItemModerated { .. } => "item_moderated",
        }
    }
}

/// Delivers marketplace events to users.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Notify `recipient` about `event`.
    async fn notify(&self, recipient: ActorId, event: MarketplaceEvent) -> AppResult<()>;
}

/// Dispatcher that drops every event.
#[derive(Clone, Default)]
pub struct NoOpNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for NoOpNotificationDispatcher {
    async fn notify(&self, _recipient: ActorId, _event: MarketplaceEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Dispatcher that writes every event to the log.
#[derive(Clone, Default)]
pub struct LoggingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingNotificationDispatcher {
    async fn notify(&self, recipient: ActorId, event: MarketplaceEvent) -> AppResult<()> {
        info!(recipient = %recipient, kind = event.kind(), ?event, "Notification");
        Ok(())
    }
}

/// Type alias for a shared dispatcher.
pub type NotificationDispatcherService = Arc<dyn NotificationDispatcher>;

/// Send `event` to every recipient, logging and swallowing failures.
pub async fn dispatch_all(
    dispatcher: &NotificationDispatcherService,
    recipients: &[ActorId],
    event: MarketplaceEvent,
) {
    for recipient in recipients {
        if let Err(e) = dispatcher.notify(*recipient, event.clone()).await {
            tracing::warn!(recipient = %recipient, kind = event.kind(), error = %e, "Notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgu_common::AppError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Failing {
        attempts: Mutex<Vec<ActorId>>,
    }

    #[async_trait]
    impl NotificationDispatcher for Failing {
        async fn notify(&self, recipient: ActorId, _event: MarketplaceEvent) -> AppResult<()> {
            if let Ok(mut attempts) = self.attempts.lock() {
                attempts.push(recipient);
            }
            Err(AppError::Internal("push gateway down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_all_swallows_failures() {
        let failing = Arc::new(Failing::default());
        let dispatcher: NotificationDispatcherService = failing.clone();

        dispatch_all(
            &dispatcher,
            &[ActorId::new(1), ActorId::new(2)],
            MarketplaceEvent::AdminDecision {
                transaction_id: 1,
                marker: "under_review".to_string(),
            },
        )
        .await;

        let attempts = failing.attempts.lock().map(|a| a.len()).unwrap_or(0);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_noop_accepts_everything() {
        let dispatcher = NoOpNotificationDispatcher;
        let result = dispatcher
            .notify(
                ActorId::new(1),
                MarketplaceEvent::ItemModerated {
                    item_id: 3,
                    approved: true,
                },
            )
            .await;
        assert!(result.is_ok());
    }
}
