//! Idempotent batch insert.
//!
//! Duplicate submissions must never corrupt counts: the insert relies on
//! the `event_id` primary key and `ON CONFLICT DO NOTHING`, so a colliding
//! row is skipped without aborting the rest of the batch. Postgres also
//! arbitrates concurrent batches carrying the same id — exactly one caller
//! observes it accepted.

use analytics_core::{Error, EventIn, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use telemetry::metrics;
use tracing::debug;

/// Rows per INSERT statement. Five bind parameters per row keeps each
/// statement far under the Postgres 65535-parameter cap; larger batches
/// are chunked inside one transaction.
pub const INSERT_CHUNK_ROWS: usize = 1000;

/// Outcome of an idempotent insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertCounts {
    /// Rows newly stored by this call.
    pub accepted: usize,
    /// Rows whose `event_id` already existed (in the store or earlier in
    /// the same batch).
    pub skipped: usize,
}

/// Insert a batch, skipping rows whose `event_id` already exists.
///
/// The whole batch commits in a single transaction: chunked statements are
/// all-or-nothing as a unit of durability, with individually skipped rows
/// being the designed exception. Empty input returns `(0, 0)` without
/// touching the store.
pub async fn insert_events_idempotent(
    store: &crate::PgStore,
    rows: &[EventIn],
) -> Result<InsertCounts> {
    if rows.is_empty() {
        return Ok(InsertCounts::default());
    }

    let start = std::time::Instant::now();

    let mut tx = store.pool().begin().await.map_err(|e| {
        metrics().store_insert_errors.inc();
        Error::store_unavailable(format!("Begin error: {}", e))
    })?;

    let mut accepted: u64 = 0;
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO events (event_id, occurred_at, user_id, event_type, properties) ",
        );
        builder.push_values(chunk, |mut b, event| {
            b.push_bind(event.event_id)
                .push_bind(event.occurred_at)
                .push_bind(&event.user_id)
                .push_bind(&event.event_type)
                .push_bind(event.properties_or_empty());
        });
        builder.push(" ON CONFLICT (event_id) DO NOTHING");

        let result = builder.build().execute(&mut *tx).await.map_err(|e| {
            metrics().store_insert_errors.inc();
            Error::store_unavailable(format!("Insert error: {}", e))
        })?;

        accepted += result.rows_affected();
    }

    tx.commit().await.map_err(|e| {
        metrics().store_insert_errors.inc();
        Error::store_unavailable(format!("Commit error: {}", e))
    })?;

    let accepted = accepted as usize;
    let skipped = rows.len() - accepted;

    let elapsed = start.elapsed();
    metrics().insert_latency_ms.observe(elapsed.as_millis() as u64);
    metrics().store_inserts.inc();
    metrics().events_accepted.inc_by(accepted as u64);
    metrics().events_skipped.inc_by(skipped as u64);

    debug!(
        accepted = accepted,
        skipped = skipped,
        latency_ms = %elapsed.as_millis(),
        "Inserted event batch"
    );

    Ok(InsertCounts { accepted, skipped })
}
