//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Once;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Competition Metrics
    pub static ref REGISTRATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("concours_registrations_total", "Candidate registration attempts"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref VOTES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("concours_votes_total", "Vote attempts"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref SCORES_TOTAL: IntCounter = IntCounter::new(
        "concours_scores_total",
        "Total number of recorded judge scores"
    ).expect("metric can be created");
    pub static ref CANDIDATES_TOTAL: IntGauge = IntGauge::new(
        "concours_candidates_total",
        "Number of candidates at the last statistics computation"
    ).expect("metric can be created");

    // Abuse Guard Metrics
    pub static ref RATE_LIMITED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("concours_rate_limited_total", "Requests rejected by the abuse guard"),
        &["action"]
    ).expect("metric can be created");

    // Media Metrics
    pub static ref MEDIA_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("concours_media_events_total", "Recorded media views and downloads"),
        &["kind"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("concours_errors_total", "Total number of error responses"),
        &["kind"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(REGISTRATIONS_TOTAL.clone()))
            .expect("REGISTRATIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(VOTES_TOTAL.clone()))
            .expect("VOTES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SCORES_TOTAL.clone()))
            .expect("SCORES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CANDIDATES_TOTAL.clone()))
            .expect("CANDIDATES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(RATE_LIMITED_TOTAL.clone()))
            .expect("RATE_LIMITED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MEDIA_EVENTS_TOTAL.clone()))
            .expect("MEDIA_EVENTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_metrics();
        init_metrics();

        VOTES_TOTAL.with_label_values(&["recorded"]).inc();
        let families = REGISTRY.gather();
        assert!(
            families
                .iter()
                .any(|family| family.get_name() == "concours_votes_total")
        );
    }
}
