//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use lgu_common::{Config, StorageBackend};
use lgu_core::{
    IdentityProviderService, ItemService, NotificationDispatcherService, OversightService,
    StaticLocationDirectory, TransactionService,
};
use lgu_db::repositories::{ItemRepository, TransactionAuditLogRepository, TransactionRepository};
use sea_orm::DatabaseConnection;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub item_service: ItemService,
    pub transaction_service: TransactionService,
    pub oversight_service: OversightService,
    pub identity: IdentityProviderService,
}

impl AppState {
    /// Wire repositories and services over one connection pool.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &Config,
        storage: Arc<dyn StorageBackend>,
        notifier: NotificationDispatcherService,
        identity: IdentityProviderService,
    ) -> Self {
        let item_repo = ItemRepository::new(Arc::clone(&db));
        let transaction_repo = TransactionRepository::new(Arc::clone(&db));
        let audit_repo = TransactionAuditLogRepository::new(db);
        let locations = Arc::new(StaticLocationDirectory::new(config.location_slugs()));
        let rules = config.marketplace.clone();

        let item_service = ItemService::new(
            item_repo.clone(),
            transaction_repo.clone(),
            storage,
            locations,
            Arc::clone(&notifier),
            rules.clone(),
        );
        let transaction_service = TransactionService::new(
            transaction_repo.clone(),
            item_repo.clone(),
            audit_repo.clone(),
            Arc::clone(&notifier),
            rules.clone(),
        );
        let oversight_service =
            OversightService::new(transaction_repo, item_repo, audit_repo, notifier, rules);

        Self {
            item_service,
            transaction_service,
            oversight_service,
            identity,
        }
    }
}

/// Authentication middleware.
///
/// A valid bearer token puts the resolved `Actor` into the request
/// extensions. Anything else leaves the request anonymous.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    if let Some(token) = token {
        match state.identity.authenticate(token) {
            Ok(actor) => {
                req.extensions_mut().insert(actor);
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring invalid bearer token"),
        }
    }

    next.run(req).await
}
