//! Analytics query endpoints.
//!
//! Pure read paths over the event store. Limit and window parameters are
//! clamped at this boundary; inverted date ranges are rejected by the
//! store's range validation.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use event_store::{DauPoint, EventTypeCount, RetentionReport};
use serde::Deserialize;
use tracing::debug;

use crate::response::ApiError;
use crate::state::AppState;

/// Bounds for the top-events `limit` parameter.
const TOP_EVENTS_LIMIT_RANGE: (i64, i64) = (1, 100);

/// Upper bound for retention `windows`.
const MAX_RETENTION_WINDOWS: i32 = 60;

#[derive(Debug, Deserialize)]
pub struct DauParams {
    /// Inclusive start, YYYY-MM-DD
    pub from: NaiveDate,
    /// Inclusive end, YYYY-MM-DD
    pub to: NaiveDate,
}

/// GET /stats/dau - distinct active users per calendar day.
pub async fn dau_handler(
    State(state): State<AppState>,
    Query(params): Query<DauParams>,
) -> Result<Json<Vec<DauPoint>>, ApiError> {
    let rows = state.store.dau(params.from, params.to).await?;
    debug!(days = rows.len(), "DAU query served");
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct TopEventsParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Max number of event types, clamped to [1, 100]
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

/// GET /stats/top-events - event counts per type, most frequent first.
pub async fn top_events_handler(
    State(state): State<AppState>,
    Query(params): Query<TopEventsParams>,
) -> Result<Json<Vec<EventTypeCount>>, ApiError> {
    let (lo, hi) = TOP_EVENTS_LIMIT_RANGE;
    let limit = params.limit.clamp(lo, hi);
    let rows = state.store.top_events(params.from, params.to, limit).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct RetentionParams {
    /// Cohort day: users whose first event fell on this date
    pub start_date: NaiveDate,
    /// Number of daily windows (D0..D{windows}), clamped to [0, 60]
    #[serde(default = "default_windows")]
    pub windows: i32,
}

fn default_windows() -> i32 {
    3
}

/// GET /stats/retention - cohort retention series.
pub async fn retention_handler(
    State(state): State<AppState>,
    Query(params): Query<RetentionParams>,
) -> Result<Json<RetentionReport>, ApiError> {
    let windows = params.windows.clamp(0, MAX_RETENTION_WINDOWS);
    let report = state.store.retention(params.start_date, windows).await?;
    Ok(Json(report))
}
