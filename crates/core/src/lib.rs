//! Core business logic for lgu-rs.

pub mod actor;
pub mod services;

pub use actor::{Actor, ActorRole, AdminScope, VerificationTier};
pub use services::*;
