//! Transaction audit trail.
//!
//! Rows are written inside the same unit of work as the status change they
//! describe and are never updated afterwards.

use chrono::Utc;
use lgu_common::{ActorId, AppResult};
use lgu_db::{
    entities::{
        transaction::TransactionStatus,
        transaction_audit_log::{self, AuditAction, AuditActorRole},
    },
    repositories::TransactionAuditLogRepository,
};
use sea_orm::{ConnectionTrait, Set};
use serde_json::{Map, Value};

const MAX_IP_LEN: usize = 64;
const MAX_USER_AGENT_LEN: usize = 255;

/// Where a request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Build a context, dropping blank values and truncating long ones.
    #[must_use]
    pub fn new(ip_address: Option<&str>, user_agent: Option<&str>) -> Self {
        Self {
            ip_address: clean(ip_address, MAX_IP_LEN),
            user_agent: clean(user_agent, MAX_USER_AGENT_LEN),
        }
    }
}

fn clean(value: Option<&str>, max_chars: usize) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.chars().take(max_chars).collect())
}

/// One audit row before it is written.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub transaction_id: i32,
    pub actor_id: Option<ActorId>,
    pub actor_role: AuditActorRole,
    pub action: AuditAction,
    pub from_status: Option<TransactionStatus>,
    pub to_status: Option<TransactionStatus>,
    pub notes: Option<String>,
    pub metadata: Map<String, Value>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(
        transaction_id: i32,
        actor_id: ActorId,
        actor_role: AuditActorRole,
        action: AuditAction,
    ) -> Self {
        Self {
            transaction_id,
            actor_id: Some(actor_id),
            actor_role,
            action,
            from_status: None,
            to_status: None,
            notes: None,
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn statuses(
        mut self,
        from: Option<TransactionStatus>,
        to: Option<TransactionStatus>,
    ) -> Self {
        self.from_status = from;
        self.to_status = to;
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    #[must_use]
    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Append the row on `conn`.
    pub async fn record<C: ConnectionTrait>(
        self,
        conn: &C,
        context: &RequestContext,
    ) -> AppResult<transaction_audit_log::Model> {
        let model = transaction_audit_log::ActiveModel {
            transaction_id: Set(self.transaction_id),
            actor_id: Set(self.actor_id.map(ActorId::get)),
            actor_role: Set(self.actor_role),
            action: Set(self.action),
            from_status: Set(self.from_status),
            to_status: Set(self.to_status),
            notes: Set(self.notes),
            ip_address: Set(context.ip_address.clone()),
            user_agent: Set(context.user_agent.clone()),
            metadata: Set(Value::Object(self.metadata)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        TransactionAuditLogRepository::append_in(conn, model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_truncates_user_agent() {
        let long = "x".repeat(400);
        let ctx = RequestContext::new(Some(" 10.1.2.3 "), Some(&long));
        assert_eq!(ctx.ip_address.as_deref(), Some("10.1.2.3"));
        assert_eq!(ctx.user_agent.map(|ua| ua.chars().count()), Some(255));
    }

    #[test]
    fn test_request_context_drops_blank_values() {
        let ctx = RequestContext::new(Some("  "), None);
        assert_eq!(ctx, RequestContext::default());
    }

    #[test]
    fn test_entry_builder() {
        let entry = AuditEntry::new(3, ActorId::new(1), AuditActorRole::Buyer, AuditAction::Dispute)
            .statuses(Some(TransactionStatus::Accepted), Some(TransactionStatus::Disputed))
            .notes(Some("no show".to_string()))
            .meta("reported_user_id", 2);

        assert_eq!(entry.metadata.get("reported_user_id"), Some(&Value::from(2)));
        assert_eq!(entry.to_status, Some(TransactionStatus::Disputed));
        assert_eq!(entry.notes.as_deref(), Some("no show"));
    }
}
