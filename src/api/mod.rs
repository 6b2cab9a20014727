//! API layer
//!
//! HTTP handlers for:
//! - Public competition endpoints (registration, votes, results, contact)
//! - Admin API
//! - Media gallery
//! - Metrics (Prometheus)

mod admin;
mod dto;
mod media;
pub mod metrics;
mod public;

pub use dto::*;

pub use admin::admin_router;
pub use media::media_router;
pub use metrics::metrics_router;
pub use public::public_router;
