//! Health and metrics endpoint tests.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{fixtures, setup::TestContext};

#[tokio::test]
async fn test_live_always_ok() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server.get("/health/live").await.assert_status_ok();
}

/// One sequential scenario: the readiness registry is process-global, so
/// healthy and degraded assertions stay in a single test to avoid races.
#[tokio::test]
async fn test_health_tracks_store_status() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["postgres_connected"], true);

    // A successful health probe marks the service ready
    server.get("/health/ready").await.assert_status_ok();

    ctx.mock_store.set_should_fail(true);

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["postgres_connected"], false);

    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_snapshot_counts_ingestion() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let payload = fixtures::batch_payload(&fixtures::events(2));
    server
        .post("/events")
        .content_type("application/json")
        .bytes(payload.into())
        .await
        .assert_status(StatusCode::ACCEPTED);

    let response = server.get("/metrics").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();

    // Counters are process-global, so other tests may have bumped them too;
    // assert lower bounds only.
    assert!(body["batches_received"].as_u64().unwrap() >= 1);
    assert!(body["events_received"].as_u64().unwrap() >= 2);
    assert!(body["events_accepted"].as_u64().unwrap() >= 2);
}
