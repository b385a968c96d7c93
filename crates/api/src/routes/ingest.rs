//! Ingestion endpoint handler.
//!
//! Accepts a JSON array of candidate events. The rate limiter is consulted
//! first, keyed by client IP; admission happens before any parsing or
//! validation work. Duplicate event ids are not errors: they surface in
//! the `skipped` count of the response.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use analytics_core::limits::MAX_BATCH_SIZE_BYTES;
use analytics_core::EventIn;
use event_store::{pipeline, IngestResult};
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error, info};

use crate::extractors::ClientIp;
use crate::response::ApiError;
use crate::state::AppState;

/// POST /events - bulk ingestion endpoint.
///
/// Returns 202 with `{accepted, skipped}`; `accepted + skipped` always
/// equals the submitted batch length.
pub async fn ingest_handler(
    State(state): State<AppState>,
    client_ip: ClientIp,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResult>), ApiError> {
    let start = Instant::now();

    metrics().batches_received.inc();

    // Admission control before any ingestion work
    if !state.rate_limiter.check(client_ip.key()) {
        metrics().rate_limited_requests.inc();
        return Err(ApiError::rate_limited("Rate limit exceeded", Some(1)));
    }

    // Check payload size before parsing
    if body.len() > MAX_BATCH_SIZE_BYTES {
        return Err(ApiError::payload_too_large(format!(
            "Payload size {}KB exceeds {}KB limit",
            body.len() / 1024,
            MAX_BATCH_SIZE_BYTES / 1024
        )));
    }

    debug!(
        client_ip = client_ip.key(),
        payload_size = body.len(),
        "Received event batch"
    );

    let batch: Vec<EventIn> = serde_json::from_slice(&body).map_err(|e| {
        error!("Failed to parse event batch: {}", e);
        ApiError::bad_request(e.to_string())
    })?;

    metrics().events_received.inc_by(batch.len() as u64);

    let result = pipeline::ingest(state.store.as_ref(), batch, state.max_batch_size).await?;

    let latency_ms = start.elapsed().as_millis() as u64;
    metrics().ingest_latency_ms.observe(latency_ms);

    info!(
        accepted = result.accepted,
        skipped = result.skipped,
        latency_ms = latency_ms,
        "Batch processed"
    );

    Ok((StatusCode::ACCEPTED, Json(result)))
}
