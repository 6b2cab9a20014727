//! Media gallery endpoints
//!
//! Public listing, stats, zip download and engagement events, plus the
//! admin listing (hidden items included) and overlay edits.

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;
use tokio_util::io::ReaderStream;

use super::dto::{ApiJson, ApiPath, MediaEventRequest, MessageResponse};
use crate::AppState;
use crate::auth::{AdminUser, ClientIp};
use crate::error::AppError;
use crate::service::AuditAction;
use crate::storage::{MediaMeta, MediaMetaUpdate, MediaPage, MediaQuery, MediaStats};

const BUNDLE_FILENAME: &str = "media.zip";

/// Create media router
///
/// Routes:
/// - GET /api/public-media
/// - GET /api/public-media/stats
/// - GET /api/public-media/download-all
/// - POST /api/public-media/events
/// - GET /media/:name
/// - GET /api/admin/media (admin)
/// - PUT /api/admin/media/:name (admin)
pub fn media_router() -> Router<AppState> {
    Router::new()
        .route("/api/public-media", get(public_listing))
        .route("/api/public-media/stats", get(stats))
        .route("/api/public-media/download-all", get(download_all))
        .route("/api/public-media/events", post(record_event))
        .route("/media/:name", get(serve))
        .route("/api/admin/media", get(admin_listing))
        .route("/api/admin/media/:name", put(update_meta))
}

/// GET /api/public-media
async fn public_listing(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<MediaPage>, AppError> {
    Ok(Json(state.media.query(false, &query).await?))
}

/// GET /api/public-media/stats
async fn stats(State(state): State<AppState>) -> Result<Json<MediaStats>, AppError> {
    Ok(Json(state.media.stats().await?))
}

/// GET /api/public-media/download-all
///
/// Same filters as the listing, without pagination. The archive is
/// streamed from its temp file.
async fn download_all(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<impl IntoResponse, AppError> {
    let bundle = state.media.download_all(&query).await?;
    let file = tokio::fs::File::from_std(bundle.file);

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_LENGTH, bundle.len.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", BUNDLE_FILENAME),
            ),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}

/// POST /api/public-media/events
async fn record_event(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MediaEventRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    state
        .media
        .record_event(&request.name, &request.event)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("ok"))))
}

/// GET /media/:name
async fn serve(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let file = state.media.read(&name).await?;

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_LENGTH, file.len.to_string()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        Body::from_stream(ReaderStream::new(file.file)),
    ))
}

/// GET /api/admin/media
async fn admin_listing(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<MediaQuery>,
) -> Result<Json<MediaPage>, AppError> {
    Ok(Json(state.media.query(true, &query).await?))
}

/// PUT /api/admin/media/:name
async fn update_meta(
    State(state): State<AppState>,
    _admin: AdminUser,
    ip: ClientIp,
    ApiPath(name): ApiPath<String>,
    ApiJson(update): ApiJson<MediaMetaUpdate>,
) -> Result<Json<MediaMeta>, AppError> {
    let media = state.media.clone();
    let audit = state.audit.clone();
    let ip = ip.as_str().to_string();

    // Detached so a dropped request cannot separate the overlay write from
    // its audit entry
    let meta = tokio::spawn(async move {
        let entry_name = name.clone();
        media
            .update_meta_with(&name, update, move |meta| async move {
                audit
                    .record(
                        AuditAction::MediaUpdate,
                        json!({ "name": entry_name, "hidden": meta.hidden, "order": meta.order }),
                        &ip,
                    )
                    .await
            })
            .await
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))??;

    Ok(Json(meta))
}
