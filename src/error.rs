//! Error types for Concours
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Every domain rejection maps to a stable status code and a `kind` tag.
/// Only the reason category is returned to the caller; storage and internal
/// failures are logged server-side in full.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed, oversized or disallowed input (400)
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid admin credentials (401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Blocked by a competition phase flag (403)
    #[error("{0}")]
    GateClosed(String),

    /// Referenced candidate, message or media is absent (404)
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation or duplicate vote (409)
    #[error("{0}")]
    Conflict(String),

    /// Abuse guard rejection (429)
    #[error("Too many attempts, try again later")]
    RateLimited,

    /// Persistence unreachable (503)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(sqlx::Error),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    /// Separate connectivity faults from query faults so operators can tell
    /// them apart.
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Tls(_) => AppError::StorageUnavailable(err),
            other => AppError::Database(other),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    /// Stable machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Unauthorized => "unauthorized",
            AppError::GateClosed(_) => "gate_closed",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::RateLimited => "rate_limited",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::Database(_) => "database",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::GateClosed(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Body is `{"message": ..., "kind": ...}`.
    fn into_response(self) -> Response {
        use axum::Json;

        let message = match &self {
            AppError::StorageUnavailable(error) => {
                tracing::error!(%error, "Storage unavailable");
                "Storage temporarily unavailable".to_string()
            }
            AppError::Database(error) => {
                tracing::error!(%error, "Database error");
                "Database error".to_string()
            }
            AppError::Config(message) => {
                tracing::error!(%message, "Configuration error");
                "Internal server error".to_string()
            }
            AppError::Internal(error) => {
                tracing::error!(error = ?error, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let kind = self.kind();
        crate::metrics::ERRORS_TOTAL.with_label_values(&[kind]).inc();

        let body = Json(serde_json::json!({
            "message": message,
            "kind": kind,
        }));

        let mut response = (self.status(), body).into_response();
        if matches!(self, AppError::Unauthorized) {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Basic realm=\"admin\""),
            );
        }
        response
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
