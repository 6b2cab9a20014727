//! Concours - competition state engine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Public endpoints (register, vote, results, contact)      │
//! │  - Admin endpoints (HTTP Basic)                             │
//! │  - Media gallery                                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Phase gates, validation, ranking                         │
//! │  - Abuse guard, audit trail                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Media directory + JSON overlay                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `storage`: Media gallery catalog
//! - `auth`: Admin credentials and request identity
//! - `validation`: Field limits and format checks
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod storage;
pub mod validation;

use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

/// Application state shared across all handlers
///
/// This struct is cloned for each request; every member sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Admin identity verifier
    pub credentials: Arc<auth::AdminCredentials>,

    /// Per-client rate limiter for public writes
    pub guard: Arc<service::AbuseGuard>,

    pub candidates: Arc<service::CandidateService>,
    pub votes: Arc<service::VoteService>,
    pub scores: Arc<service::ScoreService>,
    pub ranking: Arc<service::RankingService>,
    pub settings: Arc<service::SettingsService>,
    pub contacts: Arc<service::ContactService>,
    pub audit: Arc<service::AuditService>,

    /// Media gallery
    pub media: Arc<storage::MediaCatalog>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Seed the admin password hash if none is stored
    /// 3. Build services, abuse guard and media catalog
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        Self::with_notifier(config, Arc::new(service::LogNotifier)).await
    }

    /// Like [`new`](Self::new) with a custom contact notifier
    pub async fn with_notifier(
        config: config::AppConfig,
        notifier: Arc<dyn service::ContactNotifier>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        // 2. Seed admin credentials
        let credentials = Arc::new(auth::AdminCredentials::new(
            db.clone(),
            config.admin.username.clone(),
        ));
        credentials.seed(&config.admin.password).await?;

        // 3. Services
        let guard = Arc::new(service::AbuseGuard::in_memory(config.rate_limit.clone()));
        let media = Arc::new(storage::MediaCatalog::in_memory(
            config.media.root.clone(),
            config.media.meta_file.clone(),
        ));
        tracing::info!(root = %config.media.root.display(), "Media catalog ready");

        let state = Self {
            credentials,
            guard,
            candidates: Arc::new(service::CandidateService::new(
                db.clone(),
                config.competition.code_prefix.clone(),
            )),
            votes: Arc::new(service::VoteService::new(db.clone())),
            scores: Arc::new(service::ScoreService::new(db.clone())),
            ranking: Arc::new(service::RankingService::new(db.clone())),
            settings: Arc::new(service::SettingsService::new(db.clone())),
            contacts: Arc::new(service::ContactService::new(db.clone(), notifier)),
            audit: Arc::new(service::AuditService::new(db.clone())),
            media,
            db,
            config: Arc::new(config),
        };

        tracing::info!("Application state initialized successfully");
        Ok(state)
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, extract::DefaultBodyLimit};
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::public_router())
        .merge(api::admin_router())
        .merge(api::media_router())
        .merge(api::metrics_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    let Some(allowed_origin) = server
        .allowed_origin
        .as_deref()
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
    else {
        return CorsLayer::permissive();
    };

    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse allowed CORS origin; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

/// GET /health
///
/// 503 when the database cannot be reached.
async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<api::HealthResponse>) {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(api::HealthResponse {
                status: "ok",
                database: "ok",
            }),
        ),
        Err(error) => {
            tracing::error!(%error, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(api::HealthResponse {
                    status: "degraded",
                    database: "error",
                }),
            )
        }
    }
}
