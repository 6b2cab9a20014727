//! E2E tests for health check and basic server functionality

mod common;

use common::TestServer;
use serde_json::Value;

#[tokio::test]
async fn test_health_check_reports_database() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_cors_headers() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/health"))
        .header("Origin", "https://concours.example.com")
        .send()
        .await
        .unwrap();

    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_configured_origin_is_the_only_one_allowed() {
    let server = TestServer::with_config(|config| {
        config.server.allowed_origin = Some("https://concours.example.com".to_string());
    })
    .await;

    let allowed = server
        .client
        .get(server.url("/health"))
        .header("Origin", "https://concours.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "https://concours.example.com"
    );

    let other = server
        .client
        .get(server.url("/health"))
        .header("Origin", "https://elsewhere.example.com")
        .send()
        .await
        .unwrap();
    assert!(
        !other
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_404_for_unknown_routes() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/unknown/route"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_metrics_require_admin() {
    let server = TestServer::new().await;
    concours::metrics::init_metrics();

    let anonymous = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), 401);

    // Produce at least one sample
    server.register("Awa Diop", "+221770000001").await;

    let response = server
        .admin(reqwest::Method::GET, "/metrics")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("concours_registrations_total"));
}
