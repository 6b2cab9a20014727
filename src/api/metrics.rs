//! Prometheus scrape endpoint, admin only

use axum::{Router, http::header, response::IntoResponse, routing::get};
use prometheus::{Encoder, TextEncoder};

use crate::AppState;
use crate::auth::AdminUser;
use crate::error::AppError;
use crate::metrics::REGISTRY;

/// GET /metrics
async fn scrape(_admin: AdminUser) -> Result<impl IntoResponse, AppError> {
    let encoder = TextEncoder::new();
    let body = encoder
        .encode_to_string(&REGISTRY.gather())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode metrics: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], body))
}

pub fn metrics_router() -> Router<AppState> {
    Router::new().route("/metrics", get(scrape))
}
