//! Internal telemetry for the events analytics service.
//!
//! Counters and health live in-process; the API exposes them as JSON
//! snapshots instead of wiring in an external metrics system.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
