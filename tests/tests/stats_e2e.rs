//! Analytics query tests against real Postgres.
//!
//! The aggregation SQL (day bucketing, tie-breaking, cohort zero-fill) is
//! what's under test here, so these use the real store rather than mocks.
//!
//! Requires Docker to be running for the Postgres testcontainer (or
//! `ANALYTICS_TEST_DATABASE_URL` pointing at a database).

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{fixtures, setup::PgTestContext};

async fn ingest(server: &TestServer, batch: &[serde_json::Value]) {
    server
        .post("/events")
        .content_type("application/json")
        .bytes(fixtures::batch_payload(batch).into())
        .await
        .assert_status(StatusCode::ACCEPTED);
}

/// DAU round-trip: two distinct users on one day.
#[tokio::test]
async fn test_ingest_then_dau() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    ingest(
        &server,
        &[
            fixtures::event("u1", "login", "2025-10-20T09:00:00Z"),
            fixtures::event("u2", "purchase", "2025-10-20T10:00:00Z"),
        ],
    )
    .await;

    let response = server
        .get("/stats/dau")
        .add_query_param("from", "2025-10-20")
        .add_query_param("to", "2025-10-20")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body,
        serde_json::json!([{ "date": "2025-10-20", "unique_users": 2 }])
    );
}

/// Days without events are omitted, and a user active twice in one day
/// counts once.
#[tokio::test]
async fn test_dau_omits_empty_days_and_dedupes_users() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    ingest(
        &server,
        &[
            fixtures::event("u1", "login", "2025-10-20T09:00:00Z"),
            fixtures::event("u1", "view", "2025-10-20T18:00:00Z"),
            fixtures::event("u2", "login", "2025-10-22T09:00:00Z"),
        ],
    )
    .await;

    let response = server
        .get("/stats/dau")
        .add_query_param("from", "2025-10-19")
        .add_query_param("to", "2025-10-23")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body,
        serde_json::json!([
            { "date": "2025-10-20", "unique_users": 1 },
            { "date": "2025-10-22", "unique_users": 1 },
        ])
    );
}

/// Inverted date range is a validation error.
#[tokio::test]
async fn test_dau_inverted_range_returns_400() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .get("/stats/dau")
        .add_query_param("from", "2025-10-21")
        .add_query_param("to", "2025-10-20")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");
}

/// Ordering is count descending; ties break by event_type ascending.
#[tokio::test]
async fn test_top_events_ordering_and_tie_break() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let mut batch = Vec::new();
    for i in 0..5 {
        batch.push(fixtures::event(
            &format!("u{}", i),
            "login",
            "2025-10-20T09:00:00Z",
        ));
    }
    for i in 0..3 {
        batch.push(fixtures::event(
            &format!("u{}", i),
            "view",
            "2025-10-20T10:00:00Z",
        ));
        batch.push(fixtures::event(
            &format!("u{}", i),
            "purchase",
            "2025-10-20T11:00:00Z",
        ));
    }
    ingest(&server, &batch).await;

    let response = server
        .get("/stats/top-events")
        .add_query_param("from", "2025-10-20")
        .add_query_param("to", "2025-10-20")
        .add_query_param("limit", "2")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body,
        serde_json::json!([
            { "event_type": "login", "count": 5 },
            // view and purchase tie at 3; purchase sorts first
            { "event_type": "purchase", "count": 3 },
        ])
    );
}

/// The limit parameter is clamped into [1, 100] rather than rejected.
#[tokio::test]
async fn test_top_events_limit_is_clamped() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    ingest(
        &server,
        &[
            fixtures::event("u1", "login", "2025-10-20T09:00:00Z"),
            fixtures::event("u1", "view", "2025-10-20T10:00:00Z"),
        ],
    )
    .await;

    let response = server
        .get("/stats/top-events")
        .add_query_param("from", "2025-10-20")
        .add_query_param("to", "2025-10-20")
        .add_query_param("limit", "0")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1, "limit 0 clamps to 1");
}

/// Zero-cohort retention returns the full zero-filled series.
#[tokio::test]
async fn test_retention_zero_cohort_is_zero_filled() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .get("/stats/retention")
        .add_query_param("start_date", "2025-10-20")
        .add_query_param("windows", "3")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body,
        serde_json::json!({
            "cohort_size": 0,
            "windows": [
                { "day": 0, "count": 0, "rate": 0.0 },
                { "day": 1, "count": 0, "rate": 0.0 },
                { "day": 2, "count": 0, "rate": 0.0 },
                { "day": 3, "count": 0, "rate": 0.0 },
            ]
        })
    );
}

/// Cohort membership is by globally-first event day; every offset appears
/// even when its count is zero.
#[tokio::test]
async fn test_retention_cohort_series() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    ingest(
        &server,
        &[
            // u1, u2, u3 first seen on 2025-10-20: the cohort
            fixtures::event("u1", "login", "2025-10-20T09:00:00Z"),
            fixtures::event("u2", "login", "2025-10-20T10:00:00Z"),
            fixtures::event("u3", "login", "2025-10-20T11:00:00Z"),
            // veteran's first event was earlier; active on the 20th but
            // excluded from the cohort
            fixtures::event("veteran", "login", "2025-10-01T09:00:00Z"),
            fixtures::event("veteran", "view", "2025-10-20T12:00:00Z"),
            // day 1: u1 and u2 return
            fixtures::event("u1", "view", "2025-10-21T09:00:00Z"),
            fixtures::event("u2", "view", "2025-10-21T09:30:00Z"),
            // day 3: only u1 returns (twice, counted once)
            fixtures::event("u1", "purchase", "2025-10-23T09:00:00Z"),
            fixtures::event("u1", "view", "2025-10-23T10:00:00Z"),
        ],
    )
    .await;

    let response = server
        .get("/stats/retention")
        .add_query_param("start_date", "2025-10-20")
        .add_query_param("windows", "3")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body,
        serde_json::json!({
            "cohort_size": 3,
            "windows": [
                { "day": 0, "count": 3, "rate": 1.0 },
                { "day": 1, "count": 2, "rate": 0.6667 },
                { "day": 2, "count": 0, "rate": 0.0 },
                { "day": 3, "count": 1, "rate": 0.3333 },
            ]
        })
    );
}
