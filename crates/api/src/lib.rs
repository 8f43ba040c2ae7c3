//! HTTP API layer for lgu-rs.
//!
//! This crate exposes the marketplace over REST:
//!
//! - **Endpoints**: item catalog, transaction lifecycle, admin oversight
//! - **Extractors**: authenticated actor, admin scope, request provenance
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{health_router, router};
pub use middleware::{AppState, auth_middleware};
