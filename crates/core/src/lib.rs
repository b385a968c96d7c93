//! Core types and validation for the events analytics service.

pub mod error;
pub mod events;
pub mod limits;

pub use error::{Error, RateLimitErrorCode, Result, StoreErrorCode, ValidationErrorCode};
pub use events::EventIn;
