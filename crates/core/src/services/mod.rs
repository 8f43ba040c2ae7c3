//! Business logic services.

#![allow(missing_docs)]

pub mod audit;
pub mod identity;
pub mod item;
pub mod location;
pub mod notifier;
pub mod oversight;
pub mod transaction;
pub mod transition;

pub use audit::{AuditEntry, RequestContext};
pub use identity::{Claims, IdentityProvider, IdentityProviderService, JwtIdentityProvider};
pub use item::{CreateItemInput, ItemPage, ItemService, ItemStats, UpdateItemInput};
pub use location::{LocationDirectory, LocationDirectoryService, StaticLocationDirectory};
pub use notifier::{
    LoggingNotificationDispatcher, MarketplaceEvent, NoOpNotificationDispatcher,
    NotificationDispatcher, NotificationDispatcherService,
};
pub use oversight::{
    AdminMarker, AdminStatusInput, OversightService, TransactionDetail, TransactionPage,
};
pub use transaction::{
    DisputeInput, MyTransactions, NotesInput, ProposeInput, ProposePickupInput,
    TransactionService, parse_pickup_at,
};
pub use transition::{KindScope, Party, TransactionAction, TransitionRule};
