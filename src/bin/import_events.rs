//! CSV batch importer.
//!
//! Streams a CSV file into the idempotent ingestion path in chunks. Unlike
//! the HTTP endpoint, this path is tolerant: malformed rows are logged,
//! counted as skipped, and never abort the remaining rows.
//!
//! Expected header: event_id,occurred_at,user_id,event_type,properties_json

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use analytics_core::limits::DEFAULT_MAX_BATCH_SIZE;
use analytics_core::EventIn;
use event_store::health::init_schema;
use event_store::{ingest_tolerant, PgStore, StoreConfig};
use telemetry::init_tracing_from_env;

const REQUIRED_COLUMNS: [&str; 5] = [
    "event_id",
    "occurred_at",
    "user_id",
    "event_type",
    "properties_json",
];

#[derive(Debug, Parser)]
#[command(name = "import-events", about = "Import events from CSV (idempotent)")]
struct Args {
    /// Path to CSV file
    path: PathBuf,

    /// Rows per store batch
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    batch_size: usize,

    /// Read file but do not write to the store
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing_from_env();

    let args = Args::parse();
    let batch_size = args.batch_size.min(DEFAULT_MAX_BATCH_SIZE);

    info!(
        path = %args.path.display(),
        batch_size = batch_size,
        dry_run = args.dry_run,
        "Import started"
    );

    let store = if args.dry_run {
        None
    } else {
        let mut config = StoreConfig::default();
        if let Ok(url) = std::env::var("ANALYTICS_DATABASE_URL") {
            config.url = url;
        }
        let store = PgStore::connect(config)
            .await
            .context("Failed to connect to Postgres")?;
        if let Err(e) = init_schema(&store).await {
            bail!("Failed to initialize Postgres schema: {}", e);
        }
        Some(store)
    };

    let mut reader = csv::ReaderBuilder::new()
        .from_path(&args.path)
        .with_context(|| format!("Failed to open {}", args.path.display()))?;

    let headers: HashSet<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.contains(*c))
        .collect();
    if !missing.is_empty() {
        bail!("CSV is missing required columns: {:?}", missing);
    }

    let mut totals = Totals::default();
    let mut buf: Vec<CsvRow> = Vec::with_capacity(batch_size);

    for record in reader.deserialize::<CsvRow>() {
        match record {
            Ok(row) => buf.push(row),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable CSV record");
                totals.read += 1;
                totals.skipped += 1;
            }
        }
        if buf.len() >= batch_size {
            flush_batch(store.as_ref(), &mut buf, batch_size, &mut totals).await?;
        }
    }
    if !buf.is_empty() {
        flush_batch(store.as_ref(), &mut buf, batch_size, &mut totals).await?;
    }

    info!(
        total_read = totals.read,
        total_accepted = totals.accepted,
        total_skipped = totals.skipped,
        "Import complete"
    );
    Ok(())
}

#[derive(Debug, Default)]
struct Totals {
    read: usize,
    accepted: usize,
    skipped: usize,
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    event_id: String,
    occurred_at: String,
    user_id: String,
    event_type: String,
    properties_json: String,
}

/// Parse one CSV row into a candidate event.
fn parse_row(row: &CsvRow) -> Result<EventIn> {
    let event_id = Uuid::parse_str(row.event_id.trim()).context("invalid event_id")?;
    let occurred_at: DateTime<Utc> = DateTime::parse_from_rfc3339(row.occurred_at.trim())
        .context("invalid occurred_at")?
        .with_timezone(&Utc);

    Ok(EventIn::new(
        event_id,
        occurred_at,
        row.user_id.trim(),
        row.event_type.trim(),
        parse_properties(&row.properties_json),
    ))
}

/// Parse the properties cell.
///
/// Empty cells mean no properties. Non-object JSON values and unparseable
/// text are preserved rather than dropped, wrapped under a reserved key.
fn parse_properties(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(other) => Some(serde_json::json!({ "_value": other })),
        Err(_) => Some(serde_json::json!({ "_raw": raw })),
    }
}

async fn flush_batch(
    store: Option<&PgStore>,
    buf: &mut Vec<CsvRow>,
    batch_size: usize,
    totals: &mut Totals,
) -> Result<()> {
    let rows = std::mem::take(buf);
    totals.read += rows.len();

    let mut events = Vec::with_capacity(rows.len());
    let mut parse_failures = 0usize;
    for row in &rows {
        match parse_row(row) {
            Ok(event) => events.push(event),
            Err(e) => {
                parse_failures += 1;
                warn!(error = %e, event_id = %row.event_id, "Skipping invalid row");
            }
        }
    }

    let Some(store) = store else {
        info!(read = rows.len(), total_read = totals.read, "Batch read (dry run)");
        return Ok(());
    };

    let result = ingest_tolerant(store, events, batch_size)
        .await
        .map_err(|e| anyhow::anyhow!("Batch insert failed: {}", e))?;

    totals.accepted += result.accepted;
    totals.skipped += result.skipped + parse_failures;

    info!(
        read = rows.len(),
        accepted = result.accepted,
        skipped = result.skipped + parse_failures,
        total_accepted = totals.accepted,
        total_skipped = totals.skipped,
        total_read = totals.read,
        "Batch imported"
    );
    Ok(())
}
