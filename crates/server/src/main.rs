//! lgu-rs server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware};
use lgu_api::{AppState, auth_middleware, health_router, router as api_router};
use lgu_common::{
    Config,
    config::LogFormat,
    storage::{MAX_IMAGE_BYTES, StorageConfig},
};
use lgu_core::{JwtIdentityProvider, LoggingNotificationDispatcher};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Multipart overhead allowed on top of a single image.
const BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "lgu=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;
    init_tracing(config.logging.format);

    info!("Starting lgu-rs server...");

    // Connect to database
    info!("Connecting to database...");
    let db = lgu_db::init(&config).await?;

    info!("Running migrations...");
    lgu_db::migrate(&db).await?;
    let db = Arc::new(db);

    let storage = Arc::new(StorageConfig::from(&config.storage).build());
    let identity = Arc::new(JwtIdentityProvider::new(&config.auth));
    let notifier = Arc::new(LoggingNotificationDispatcher);

    let state = AppState::new(db, &config, storage, notifier, identity);

    let app = Router::new()
        .merge(health_router())
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}
