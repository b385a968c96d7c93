//! Event type definitions for the analytics service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::limits::MAX_PROPERTIES_BYTES;

/// Validates that a string has content after trimming whitespace.
fn validate_non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must be non-empty after trimming".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that properties form a string-keyed map of bounded size.
fn validate_properties(props: &serde_json::Value) -> Result<(), ValidationError> {
    if !props.is_object() {
        let mut err = ValidationError::new("properties_not_a_map");
        err.message = Some("properties must be a JSON object".into());
        return Err(err);
    }

    let size = serde_json::to_vec(props).map(|v| v.len()).unwrap_or(0);

    if size > MAX_PROPERTIES_BYTES {
        let mut err = ValidationError::new("properties_too_large");
        err.message = Some(
            format!(
                "properties {}KB exceeds {}KB limit",
                size / 1024,
                MAX_PROPERTIES_BYTES / 1024
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// A single candidate event submitted for ingestion.
///
/// `event_id` is the idempotency key: the first stored write wins
/// permanently, later submissions with the same id are skipped.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventIn {
    /// Globally unique event ID (idempotency key)
    pub event_id: Uuid,
    /// Caller-supplied event timestamp (not server receipt time)
    pub occurred_at: DateTime<Utc>,
    /// Acting user
    #[validate(custom(function = "validate_non_blank"))]
    pub user_id: String,
    /// Action name
    #[validate(custom(function = "validate_non_blank"))]
    pub event_type: String,
    /// Opaque properties map; absent means empty. Contents are never
    /// inspected, only shape and size are checked.
    #[validate(custom(function = "validate_properties"))]
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
}

impl EventIn {
    pub fn new(
        event_id: Uuid,
        occurred_at: DateTime<Utc>,
        user_id: impl Into<String>,
        event_type: impl Into<String>,
        properties: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_id,
            occurred_at,
            user_id: user_id.into(),
            event_type: event_type.into(),
            properties,
        }
    }

    /// Trims surrounding whitespace from the string fields.
    ///
    /// Validation checks the trimmed form, so callers normalize before
    /// storing to keep the stored value and the validated value identical.
    pub fn normalize(&mut self) {
        let trimmed = self.user_id.trim();
        if trimmed.len() != self.user_id.len() {
            self.user_id = trimmed.to_string();
        }
        let trimmed = self.event_type.trim();
        if trimmed.len() != self.event_type.len() {
            self.event_type = trimmed.to_string();
        }
    }

    /// Properties as stored: absent is treated as an empty map.
    pub fn properties_or_empty(&self) -> serde_json::Value {
        self.properties
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()))
    }
}
