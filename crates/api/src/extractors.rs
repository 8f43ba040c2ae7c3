//! Request extractors.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use lgu_common::AppError;
use lgu_core::{Actor, AdminScope, RequestContext};

/// Authenticated actor extractor.
#[derive(Debug, Clone)]
pub struct AuthActor(pub Actor);

impl<S> FromRequestParts<S> for AuthActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(AuthActor)
            .ok_or(AppError::Unauthorized)
    }
}

/// Authenticated admin together with the territory they administer.
#[derive(Debug, Clone)]
pub struct AdminActor {
    pub actor: Actor,
    pub scope: AdminScope,
}

impl<S> FromRequestParts<S> for AdminActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthActor(actor) = AuthActor::from_request_parts(parts, state).await?;
        let scope = actor.admin_scope()?;
        Ok(Self { actor, scope })
    }
}

/// Client address and user agent for the audit trail.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta(pub RequestContext);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    header(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            header(headers, "x-real-ip")
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let ip = client_ip(&parts.headers, peer);
        let user_agent = header(&parts.headers, "user-agent");

        Ok(Self(RequestContext::new(ip.as_deref(), user_agent)))
    }
}
