//! Repository layer.

#![allow(missing_docs)]

pub mod item;
pub mod transaction;
pub mod transaction_audit_log;

pub use item::{ItemListFilter, ItemRepository};
pub use transaction::TransactionRepository;
pub use transaction_audit_log::TransactionAuditLogRepository;
