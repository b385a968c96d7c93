//! Analytics queries: DAU, top events, retention cohorts.
//!
//! All three are pure read-time aggregations; nothing is materialized.
//! Calendar days use the UTC convention throughout: the day of an event is
//! `(occurred_at AT TIME ZONE 'UTC')::date`, and a day `d` covers
//! `[d 00:00Z, d+1 00:00Z)`.

use analytics_core::{Error, Result};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use telemetry::metrics;

use crate::PgStore;

/// Distinct users on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DauPoint {
    pub date: NaiveDate,
    pub unique_users: i64,
}

/// Event count for one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EventTypeCount {
    pub event_type: String,
    pub count: i64,
}

/// Cohort activity at one day offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPoint {
    pub day: i32,
    pub count: i64,
    pub rate: f64,
}

/// Retention series for one cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub cohort_size: i64,
    pub windows: Vec<RetentionPoint>,
}

/// Rejects inverted date ranges.
pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if to < from {
        return Err(Error::validation("'to' must be >= 'from'"));
    }
    Ok(())
}

/// UTC timestamp bounds `[from 00:00Z, to+1d 00:00Z)` for an inclusive
/// date range.
pub fn day_range_bounds(from: NaiveDate, to: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let end_date = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::validation("date out of range"))?;
    let start = from.and_time(NaiveTime::MIN).and_utc();
    let end = end_date.and_time(NaiveTime::MIN).and_utc();
    Ok((start, end))
}

/// Retention rate rounded to 4 decimal places; zero cohorts rate at 0.0.
pub fn retention_rate(count: i64, cohort_size: i64) -> f64 {
    if cohort_size <= 0 {
        return 0.0;
    }
    let rate = count as f64 / cohort_size as f64;
    (rate * 10_000.0).round() / 10_000.0
}

/// Assembles the retention series from per-offset active counts, keeping
/// every offset present (zero-filled series, unlike DAU's omission policy).
pub fn build_retention_report(cohort_size: i64, points: &[(i32, i64)]) -> RetentionReport {
    let windows = points
        .iter()
        .map(|&(day, count)| RetentionPoint {
            day,
            count,
            rate: retention_rate(count, cohort_size),
        })
        .collect();
    RetentionReport {
        cohort_size,
        windows,
    }
}

fn query_err(e: sqlx::Error) -> Error {
    metrics().store_query_errors.inc();
    Error::store_unavailable(format!("Query error: {}", e))
}

/// Daily active users per calendar day in `[from, to]` inclusive.
///
/// Days without events yield no group and are omitted from the result.
pub async fn dau(store: &PgStore, from: NaiveDate, to: NaiveDate) -> Result<Vec<DauPoint>> {
    validate_date_range(from, to)?;
    let (start_ts, end_ts) = day_range_bounds(from, to)?;

    let start = std::time::Instant::now();
    let rows: Vec<DauPoint> = sqlx::query_as(
        r#"
        SELECT (occurred_at AT TIME ZONE 'UTC')::date AS date,
               COUNT(DISTINCT user_id) AS unique_users
        FROM events
        WHERE occurred_at >= $1 AND occurred_at < $2
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(start_ts)
    .bind(end_ts)
    .fetch_all(store.pool())
    .await
    .map_err(query_err)?;

    metrics()
        .query_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    Ok(rows)
}

/// Event counts per type in `[from, to]` inclusive, most frequent first.
///
/// Ties are broken by event_type ascending so results are reproducible.
pub async fn top_events(
    store: &PgStore,
    from: NaiveDate,
    to: NaiveDate,
    limit: i64,
) -> Result<Vec<EventTypeCount>> {
    validate_date_range(from, to)?;
    let (start_ts, end_ts) = day_range_bounds(from, to)?;

    let start = std::time::Instant::now();
    let rows: Vec<EventTypeCount> = sqlx::query_as(
        r#"
        SELECT event_type, COUNT(*) AS count
        FROM events
        WHERE occurred_at >= $1 AND occurred_at < $2
        GROUP BY event_type
        ORDER BY COUNT(*) DESC, event_type ASC
        LIMIT $3
        "#,
    )
    .bind(start_ts)
    .bind(end_ts)
    .bind(limit)
    .fetch_all(store.pool())
    .await
    .map_err(query_err)?;

    metrics()
        .query_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    Ok(rows)
}

/// Retention for the cohort of users whose first-ever event fell on
/// `start_date`, over day offsets `0..=windows`.
///
/// Every offset appears in the series even when its count is zero; an
/// empty cohort returns the full zero-filled series with `cohort_size` 0.
pub async fn retention(
    store: &PgStore,
    start_date: NaiveDate,
    windows: i32,
) -> Result<RetentionReport> {
    let start = std::time::Instant::now();

    let cohort_size: i64 = sqlx::query_scalar(
        r#"
        WITH first_events AS (
            SELECT user_id, MIN((occurred_at AT TIME ZONE 'UTC')::date) AS first_date
            FROM events
            GROUP BY user_id
        )
        SELECT COUNT(*)
        FROM first_events
        WHERE first_date = $1
        "#,
    )
    .bind(start_date)
    .fetch_one(store.pool())
    .await
    .map_err(query_err)?;

    if cohort_size == 0 {
        let points: Vec<(i32, i64)> = (0..=windows).map(|d| (d, 0)).collect();
        metrics()
            .query_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        return Ok(build_retention_report(0, &points));
    }

    let points: Vec<(i32, i64)> = sqlx::query_as(
        r#"
        WITH cohort AS (
            SELECT user_id
            FROM (
                SELECT user_id, MIN((occurred_at AT TIME ZONE 'UTC')::date) AS first_date
                FROM events
                GROUP BY user_id
            ) t
            WHERE t.first_date = $1
        ),
        days AS (
            SELECT generate_series(0, $2) AS d
        )
        SELECT days.d AS day, COUNT(DISTINCT e.user_id) AS count
        FROM days
        LEFT JOIN events e
          ON e.user_id IN (SELECT user_id FROM cohort)
         AND e.occurred_at >= (($1::date + days.d)::timestamp AT TIME ZONE 'UTC')
         AND e.occurred_at <  (($1::date + days.d + 1)::timestamp AT TIME ZONE 'UTC')
        GROUP BY days.d
        ORDER BY days.d
        "#,
    )
    .bind(start_date)
    .bind(windows)
    .fetch_all(store.pool())
    .await
    .map_err(query_err)?;

    metrics()
        .query_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    Ok(build_retention_report(cohort_size, &points))
}

/// Count all stored events (tests and admin tooling).
pub async fn count_events(store: &PgStore) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM events")
        .fetch_one(store.pool())
        .await
        .map_err(query_err)
}

/// Remove all stored events (test cleanup).
pub async fn truncate_events(store: &PgStore) -> Result<()> {
    sqlx::query("TRUNCATE TABLE events")
        .execute(store.pool())
        .await
        .map_err(query_err)?;
    Ok(())
}
