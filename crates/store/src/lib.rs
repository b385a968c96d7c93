//! Postgres event store for the analytics service.

pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod pipeline;
pub mod query;
pub mod schema;

pub use client::{EventStore, PgStore};
pub use config::StoreConfig;
pub use insert::{insert_events_idempotent, InsertCounts};
pub use pipeline::{ingest, ingest_tolerant, IngestResult};
pub use query::*;
