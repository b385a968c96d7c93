//! End-to-end ingestion tests against real Postgres.
//!
//! These validate the idempotency contract where it actually lives: the
//! unique index on event_id and `ON CONFLICT DO NOTHING` arbitration.
//!
//! Requires Docker to be running for the Postgres testcontainer (or
//! `ANALYTICS_TEST_DATABASE_URL` pointing at a database).

use axum::http::StatusCode;
use axum_test::TestServer;
use event_store::query::count_events;
use event_store::EventStore;
use integration_tests::{fixtures, setup::PgTestContext};

/// Inserting the same batch twice yields (N, 0) then (0, N).
#[tokio::test]
async fn test_ingest_idempotent_roundtrip() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let batch = fixtures::events(5);
    let payload = fixtures::batch_payload(&batch);

    let response = server
        .post("/events")
        .content_type("application/json")
        .bytes(payload.clone().into())
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], 5);
    assert_eq!(body["skipped"], 0);

    let response = server
        .post("/events")
        .content_type("application/json")
        .bytes(payload.into())
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], 0);
    assert_eq!(body["skipped"], 5);

    let stored = count_events(&ctx.store).await.expect("count failed");
    assert_eq!(stored, 5, "Replays must not create additional rows");
}

/// A batch carrying an internal duplicate accepts exactly one of the pair.
#[tokio::test]
async fn test_intra_batch_duplicate_yields_one_accepted() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let shared = uuid::Uuid::new_v4();
    let batch = vec![
        fixtures::event_with_id(shared, "u1", "x", "2025-10-20T11:00:00Z"),
        fixtures::event_with_id(shared, "u2", "y", "2025-10-20T11:01:00Z"),
        fixtures::event("u3", "z", "2025-10-20T11:02:00Z"),
    ];

    let response = server
        .post("/events")
        .content_type("application/json")
        .bytes(fixtures::batch_payload(&batch).into())
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], 2);
    assert_eq!(body["skipped"], 1);

    let stored = count_events(&ctx.store).await.expect("count failed");
    assert_eq!(stored, 2);
}

/// accepted + skipped always equals the submitted batch length.
#[tokio::test]
async fn test_accepted_plus_skipped_is_batch_len() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    // Seed a few rows, then submit a batch overlapping the seeded ids
    let seeded = fixtures::events(3);
    server
        .post("/events")
        .content_type("application/json")
        .bytes(fixtures::batch_payload(&seeded).into())
        .await
        .assert_status(StatusCode::ACCEPTED);

    let mut batch = seeded[..2].to_vec();
    batch.extend(fixtures::events(4));
    let len = batch.len();

    let response = server
        .post("/events")
        .content_type("application/json")
        .bytes(fixtures::batch_payload(&batch).into())
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    let accepted = body["accepted"].as_u64().unwrap();
    let skipped = body["skipped"].as_u64().unwrap();
    assert_eq!(accepted + skipped, len as u64);
    assert_eq!(accepted, 4);
}

/// Concurrent submissions of the same batch: the store arbitrates, and
/// exactly one caller wins each id system-wide.
#[tokio::test]
async fn test_concurrent_same_batch_accepts_each_id_once() {
    let ctx = PgTestContext::new().await;

    let batch: Vec<analytics_core::EventIn> = fixtures::events(10)
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect();

    let (first, second) = tokio::join!(
        ctx.store.insert_events_idempotent(&batch),
        ctx.store.insert_events_idempotent(&batch),
    );
    let first = first.expect("first insert failed");
    let second = second.expect("second insert failed");

    assert_eq!(
        first.accepted + second.accepted,
        10,
        "Each id must be accepted exactly once across all callers"
    );
    assert_eq!(first.accepted + first.skipped, 10);
    assert_eq!(second.accepted + second.skipped, 10);

    let stored = count_events(&ctx.store).await.expect("count failed");
    assert_eq!(stored, 10);
}

/// First write wins permanently: a replayed id never overwrites fields.
#[tokio::test]
async fn test_first_write_wins_on_replay() {
    let ctx = PgTestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let id = uuid::Uuid::new_v4();
    let original = vec![fixtures::event_with_id(
        id,
        "original",
        "login",
        "2025-10-20T09:00:00Z",
    )];
    let replay = vec![fixtures::event_with_id(
        id,
        "intruder",
        "purchase",
        "2025-10-21T09:00:00Z",
    )];

    for batch in [&original, &replay] {
        server
            .post("/events")
            .content_type("application/json")
            .bytes(fixtures::batch_payload(batch).into())
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    let user_id: String =
        sqlx::query_scalar("SELECT user_id FROM events WHERE event_id = $1")
            .bind(id)
            .fetch_one(ctx.store.pool())
            .await
            .expect("fetch failed");
    assert_eq!(user_id, "original");
}
