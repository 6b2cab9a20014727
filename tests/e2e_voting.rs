//! E2E tests for public voting and results

mod common;

use common::TestServer;
use concours::service::SettingsUpdate;
use serde_json::{Value, json};

#[tokio::test]
async fn test_vote_requires_open_voting() {
    let server = TestServer::new().await;
    let id = server.register("Awa Diop", "+221770000001").await;

    let closed = server
        .post_as("198.51.100.30", "/api/votes", &json!({ "candidateId": id }))
        .await;
    assert_eq!(closed.status(), 403);
    let body: Value = closed.json().await.unwrap();
    assert_eq!(body["kind"], "gate_closed");

    server.open_voting().await;
    let open = server
        .post_as("198.51.100.30", "/api/votes", &json!({ "candidateId": id }))
        .await;
    assert_eq!(open.status(), 201);

    // Closing the competition overrides the voting switch
    server
        .set_settings(SettingsUpdate {
            voting_enabled: Some(1),
            competition_closed: Some(1),
            ..Default::default()
        })
        .await;
    let after_close = server
        .post_as("198.51.100.31", "/api/votes", &json!({ "candidateId": id }))
        .await;
    assert_eq!(after_close.status(), 403);
}

#[tokio::test]
async fn test_one_vote_per_client_and_candidate() {
    let server = TestServer::new().await;
    let first = server.register("Awa Diop", "+221770000001").await;
    let second = server.register("Moussa Ba", "+221770000002").await;
    server.open_voting().await;

    let response = server
        .post_as(
            "198.51.100.40",
            "/api/votes",
            &json!({ "candidateId": first, "voterName": "Fatou" }),
        )
        .await;
    assert_eq!(response.status(), 201);

    // Numeric strings are accepted for the id
    let repeat = server
        .post_as(
            "198.51.100.40",
            "/api/votes",
            &json!({ "candidateId": first.to_string() }),
        )
        .await;
    assert_eq!(repeat.status(), 409);
    let body: Value = repeat.json().await.unwrap();
    assert_eq!(body["kind"], "conflict");
    assert_eq!(body["message"], concours::data::VOTE_ALREADY_RECORDED);

    let other_candidate = server
        .post_as("198.51.100.40", "/api/votes", &json!({ "candidateId": second }))
        .await;
    assert_eq!(other_candidate.status(), 201);

    let other_client = server
        .post_as("198.51.100.41", "/api/votes", &json!({ "candidateId": first }))
        .await;
    assert_eq!(other_client.status(), 201);
}

#[tokio::test]
async fn test_concurrent_votes_record_once() {
    let server = TestServer::new().await;
    let id = server.register("Awa Diop", "+221770000001").await;
    server.open_voting().await;

    let mut requests = Vec::new();
    for _ in 0..8 {
        let client = server.client.clone();
        let url = server.url("/api/votes");
        requests.push(tokio::spawn(async move {
            client
                .post(url)
                .header("X-Forwarded-For", "198.51.100.50")
                .json(&json!({ "candidateId": id }))
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        }));
    }

    let mut statuses = Vec::new();
    for request in requests {
        statuses.push(request.await.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == 201).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 409).count(), 7);
}

#[tokio::test]
async fn test_vote_rejects_missing_or_unknown_candidate() {
    let server = TestServer::new().await;
    server.open_voting().await;

    let missing_id = server
        .post_as("198.51.100.60", "/api/votes", &json!({ "voterName": "Fatou" }))
        .await;
    assert_eq!(missing_id.status(), 400);
    let body: Value = missing_id.json().await.unwrap();
    assert_eq!(body["kind"], "validation");

    let unknown = server
        .post_as("198.51.100.60", "/api/votes", &json!({ "candidateId": 999 }))
        .await;
    assert_eq!(unknown.status(), 404);
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_vote_rate_limit() {
    let server = TestServer::with_config(|config| {
        config.rate_limit.vote.limit = 1;
    })
    .await;
    let first = server.register("Awa Diop", "+221770000001").await;
    let second = server.register("Moussa Ba", "+221770000002").await;
    server.open_voting().await;

    let allowed = server
        .post_as("198.51.100.70", "/api/votes", &json!({ "candidateId": first }))
        .await;
    assert_eq!(allowed.status(), 201);

    let limited = server
        .post_as("198.51.100.70", "/api/votes", &json!({ "candidateId": second }))
        .await;
    assert_eq!(limited.status(), 429);
    let body: Value = limited.json().await.unwrap();
    assert_eq!(body["kind"], "rate_limited");
}

#[tokio::test]
async fn test_public_results_and_qualified() {
    let server = TestServer::new().await;
    let awa = server.register("Awa Diop", "+221770000001").await;
    let moussa = server.register("Moussa Ba", "+221770000002").await;
    let fatou = server.register("Fatou Sow", "+221770000003").await;
    server.open_voting().await;

    for (ip, candidate) in [
        ("203.0.113.1", moussa),
        ("203.0.113.2", moussa),
        ("203.0.113.3", fatou),
    ] {
        let response = server
            .post_as(ip, "/api/votes", &json!({ "candidateId": candidate }))
            .await;
        assert_eq!(response.status(), 201);
    }

    let results: Value = server
        .client
        .get(server.url("/api/public-results"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let ordered: Vec<i64> = results["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ordered, vec![moussa, fatou, awa]);
    assert_eq!(results["candidates"][0]["totalVotes"], 2);
    assert_eq!(results["stats"]["totalCandidates"], 3);
    assert_eq!(results["stats"]["totalVotes"], 3);

    let qualified: Value = server
        .client
        .get(server.url("/api/public-results/qualified"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(qualified["qualifiedIds"], json!([moussa, fatou, awa]));
}

#[tokio::test]
async fn test_public_settings_hide_internal_fields() {
    let server = TestServer::new().await;
    server
        .set_settings(SettingsUpdate {
            voting_enabled: Some(1),
            announcement_text: Some("Finale le 12 mars".to_string()),
            ..Default::default()
        })
        .await;

    let settings: Value = server
        .client
        .get(server.url("/api/public-settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(settings["votingEnabled"], 1);
    assert_eq!(settings["announcementText"], "Finale le 12 mars");
    assert!(settings.get("maxCandidates").is_none());
}
