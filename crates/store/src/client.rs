//! Postgres store client and the `EventStore` trait.

use std::time::Duration;

use analytics_core::{EventIn, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::StoreConfig;
use crate::insert::{self, InsertCounts};
use crate::query::{self, DauPoint, EventTypeCount, RetentionReport};

/// Storage contract consumed by the ingestion pipeline and the API layer.
///
/// `PgStore` is the production implementation; tests substitute an
/// in-memory implementation with the same semantics.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Atomic insert-or-skip-on-duplicate-key over a batch.
    ///
    /// Duplicate `event_id`s (previously stored or repeated within the
    /// batch) are counted as skipped, never raised as errors. Either the
    /// whole batch's effects are durable or none are.
    async fn insert_events_idempotent(&self, rows: &[EventIn]) -> Result<InsertCounts>;

    /// Distinct active users per UTC calendar day in `[from, to]`.
    async fn dau(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DauPoint>>;

    /// Event counts per type in `[from, to]`, descending, ties broken by
    /// event_type ascending, truncated to `limit`.
    async fn top_events(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<EventTypeCount>>;

    /// Cohort retention for users whose first event fell on `start_date`,
    /// over day offsets `0..=windows`.
    async fn retention(&self, start_date: NaiveDate, windows: i32) -> Result<RetentionReport>;

    /// Connectivity probe.
    async fn ping(&self) -> Result<()>;
}

/// Postgres store wrapper with connection pooling.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PgStore {
    /// Connects a pool with the given configuration.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| {
                analytics_core::Error::store_unavailable(format!("Connect error: {}", e))
            })?;

        info!(
            max_connections = config.max_connections,
            "Created Postgres pool"
        );

        Ok(Self { pool, config })
    }

    /// Wraps an existing pool (tests, tooling).
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            config: StoreConfig::default(),
        }
    }

    /// Returns the inner pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn insert_events_idempotent(&self, rows: &[EventIn]) -> Result<InsertCounts> {
        insert::insert_events_idempotent(self, rows).await
    }

    async fn dau(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DauPoint>> {
        query::dau(self, from, to).await
    }

    async fn top_events(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<EventTypeCount>> {
        query::top_events(self, from, to, limit).await
    }

    async fn retention(&self, start_date: NaiveDate, windows: i32) -> Result<RetentionReport> {
        query::retention(self, start_date, windows).await
    }

    async fn ping(&self) -> Result<()> {
        crate::health::check_connection(self)
            .await
            .then_some(())
            .ok_or_else(|| analytics_core::Error::store_unavailable("ping failed"))
    }
}
