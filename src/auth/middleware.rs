//! Request identity extractors
//!
//! `AdminUser` guards privileged handlers with HTTP Basic credentials.
//! `ClientIp` names the caller for rate limiting, vote dedup and audit.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use std::net::SocketAddr;

use crate::AppState;
use crate::error::AppError;

/// Extractor for an authenticated admin
///
/// # Usage
/// ```ignore
/// async fn handler(_admin: AdminUser) -> impl IntoResponse {
///     "privileged"
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub username: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(admin) = parts.extensions.get::<AdminUser>().cloned() {
            return Ok(admin);
        }

        let TypedHeader(Authorization(basic)) =
            TypedHeader::<Authorization<Basic>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized)?;

        let app_state = AppState::from_ref(state);
        if !app_state
            .credentials
            .verify(basic.username(), basic.password())
            .await?
        {
            tracing::warn!(username = %basic.username(), "Rejected admin credentials");
            return Err(AppError::Unauthorized);
        }

        let admin = AdminUser {
            username: basic.username().to_string(),
        };
        parts.extensions.insert(admin.clone());
        Ok(admin)
    }
}

/// Originating client address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// First entry of `X-Forwarded-For`, then the socket peer, then `"unknown"`
pub fn client_ip_from(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match (forwarded, peer) {
        (Some(forwarded), _) => forwarded.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(client_ip_from(&parts.headers, peer)))
    }
}
