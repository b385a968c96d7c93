//! Size limits for the ingestion path.
//!
//! MEMORY SAFETY: These limits prevent memory exhaustion from oversized
//! requests. Batch row limits are configurable at runtime (`max_batch_size`
//! in the service config); the byte-level caps here are fixed.

// === Batch Limits ===

/// Maximum batch payload size in bytes (8MB).
///
/// Checked before parsing. At the default 5000-row batch limit with ~1KB
/// average rows this leaves headroom for large properties payloads.
pub const MAX_BATCH_SIZE_BYTES: usize = 8 * 1024 * 1024;

/// Default maximum rows per batch.
///
/// Runtime-configurable; centralized here for the default.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 5000;

// === Row Limits ===

/// Maximum properties JSON size in bytes (16KB).
///
/// Most real-world event properties are under 1KB.
pub const MAX_PROPERTIES_BYTES: usize = 16 * 1024;
