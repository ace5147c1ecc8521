//! Centralized default constants for ripple.
//!
//! **This module is the single source of truth** for shared default values.
//! Config structs in the other crates fall back to these when the matching
//! environment variable is unset or unparsable.

// =============================================================================
// TOPICS
// =============================================================================

/// Prefix prepended to every key for both pub/sub topics and history lists.
pub const NAMESPACE: &str = "q.";

// =============================================================================
// HISTORY
// =============================================================================

/// Entries retained per key. 0 disables history entirely.
pub const HISTORY_LIMIT: usize = 100;

/// A list is trimmed back to the retention limit once it grows past
/// `HISTORY_TRIM_FACTOR * limit`, so trims are amortized over many appends.
pub const HISTORY_TRIM_FACTOR: usize = 2;

// =============================================================================
// SUBSCRIBERS
// =============================================================================

/// Buffered events per subscriber before live deliveries start being skipped.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// Capacity of a duplicate window used during catch-up replay.
pub const DUPLICATE_WINDOW: usize = 128;

// =============================================================================
// TRANSPORT
// =============================================================================

/// Default Redis connection URL.
pub const REDIS_URL: &str = "redis://localhost:6379";

/// Per-call deadline for publish and list operations.
pub const TRANSPORT_IO_TIMEOUT_MS: u64 = 2_000;

/// Buffer of the in-process memory transport's pub/sub channel.
pub const MEMORY_TRANSPORT_CAPACITY: usize = 1024;
