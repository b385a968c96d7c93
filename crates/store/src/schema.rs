//! Postgres table schema.
//!
//! The events table is append-only: rows are created exactly once via the
//! ingestion path, never updated, never deleted by this service. The
//! `event_id` primary key is the idempotency key for duplicate detection.

/// SQL for creating the events table.
pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    event_id UUID PRIMARY KEY,
    occurred_at TIMESTAMPTZ NOT NULL,
    user_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    properties JSONB
)
"#;

/// BRIN index on occurred_at: time-range scans over an append-mostly table.
pub const CREATE_OCCURRED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS ix_events_occurred_at_brin ON events USING BRIN (occurred_at)";

/// Btree index on user_id for cohort and distinct-user aggregation.
pub const CREATE_USER_ID_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS ix_events_user_id ON events (user_id)";

/// Btree index on event_type for top-events grouping.
pub const CREATE_EVENT_TYPE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS ix_events_event_type ON events (event_type)";

/// All DDL statements in application order.
pub fn all_statements() -> [&'static str; 4] {
    [
        CREATE_EVENTS_TABLE,
        CREATE_OCCURRED_AT_INDEX,
        CREATE_USER_ID_INDEX,
        CREATE_EVENT_TYPE_INDEX,
    ]
}
