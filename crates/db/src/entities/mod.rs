//! Database entities.

#![allow(missing_docs)]

pub mod item;
pub mod transaction;
pub mod transaction_audit_log;

pub use item::Entity as Item;
pub use transaction::Entity as Transaction;
pub use transaction_audit_log::Entity as TransactionAuditLog;
