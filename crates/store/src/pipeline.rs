//! Ingestion pipeline: batch validation in front of the idempotent insert.
//!
//! Two row-validation policies share one predicate:
//! - `ingest` (synchronous HTTP path): any malformed row fails the whole
//!   batch before the store is touched.
//! - `ingest_tolerant` (batch-file import path): malformed rows are
//!   dropped, logged, and counted as skipped; the rest continue.
//!
//! Rate limiting happens at the transport boundary before either entry
//! point is reached.

use analytics_core::{Error, EventIn, Result, ValidationErrorCode};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::warn;
use validator::Validate;

use crate::client::EventStore;
use crate::insert::InsertCounts;

/// Outcome of one ingestion call. `accepted + skipped` always equals the
/// submitted batch length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    pub accepted: usize,
    pub skipped: usize,
}

impl From<InsertCounts> for IngestResult {
    fn from(counts: InsertCounts) -> Self {
        Self {
            accepted: counts.accepted,
            skipped: counts.skipped,
        }
    }
}

fn check_batch_size(len: usize, max_batch_size: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::validation_code(
            ValidationErrorCode::EmptyBatch,
            "empty batch",
        ));
    }
    if len > max_batch_size {
        return Err(Error::validation_code(
            ValidationErrorCode::BatchTooLarge,
            format!("batch has {} rows, exceeds {} limit", len, max_batch_size),
        ));
    }
    Ok(())
}

/// Strict ingestion: validates every row, then inserts idempotently.
///
/// The store is not touched unless the entire batch is structurally valid.
pub async fn ingest(
    store: &dyn EventStore,
    mut batch: Vec<EventIn>,
    max_batch_size: usize,
) -> Result<IngestResult> {
    check_batch_size(batch.len(), max_batch_size)?;

    for (row, event) in batch.iter_mut().enumerate() {
        event.normalize();
        if let Err(e) = event.validate() {
            metrics().events_failed_validation.inc();
            return Err(Error::validation_code(
                ValidationErrorCode::InvalidFormat,
                format!("row {}: {}", row, e),
            ));
        }
    }

    let counts = store.insert_events_idempotent(&batch).await?;
    Ok(counts.into())
}

/// Best-effort ingestion: drops malformed rows and continues.
///
/// Dropped rows are counted as skipped, so `accepted + skipped` still
/// equals the submitted batch length. An empty batch is a no-op here, not
/// an error: the import path feeds whatever the file contains.
pub async fn ingest_tolerant(
    store: &dyn EventStore,
    batch: Vec<EventIn>,
    max_batch_size: usize,
) -> Result<IngestResult> {
    if batch.is_empty() {
        return Ok(IngestResult::default());
    }
    if batch.len() > max_batch_size {
        return Err(Error::validation_code(
            ValidationErrorCode::BatchTooLarge,
            format!(
                "batch has {} rows, exceeds {} limit",
                batch.len(),
                max_batch_size
            ),
        ));
    }

    let total = batch.len();
    let mut valid = Vec::with_capacity(total);
    for (row, mut event) in batch.into_iter().enumerate() {
        event.normalize();
        match event.validate() {
            Ok(()) => valid.push(event),
            Err(e) => {
                metrics().events_failed_validation.inc();
                warn!(row = row, error = %e, "dropping malformed row");
            }
        }
    }

    let dropped = total - valid.len();
    let counts = if valid.is_empty() {
        InsertCounts::default()
    } else {
        store.insert_events_idempotent(&valid).await?
    };

    Ok(IngestResult {
        accepted: counts.accepted,
        skipped: counts.skipped + dropped,
    })
}
