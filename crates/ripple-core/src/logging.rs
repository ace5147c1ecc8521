//! Structured logging schema and field name constants for ripple.
//!
//! All crates log with these field names so log aggregation can query one
//! key, event or subscriber across the queue, the bridge and the transport.
//! Every line also carries a `subsystem` field whose value is one of the
//! subsystem constants at the bottom of this module.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Real-time capability lost (bridge startup failed) |
//! | WARN  | Absorbed failure: history append/trim failed, malformed record dropped |
//! | INFO  | Lifecycle events (connect, bridge listening/terminated) |
//! | DEBUG | Subscribe/unsubscribe, publish outcomes, replay decisions |
//! | TRACE | Per-event fan-out and per-subscriber delivery |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: see the subsystem constants below.
pub const SUBSYSTEM: &str = "subsystem";

/// Un-namespaced topic key.
pub const KEY: &str = "key";

/// Namespaced transport topic (`q.<key>`).
pub const TOPIC: &str = "topic";

/// Bridge subscription pattern (`q.*`).
pub const PATTERN: &str = "pattern";

/// Subscriber handle id.
pub const SUBSCRIBER_ID: &str = "subscriber_id";

// ─── Event fields ──────────────────────────────────────────────────────────

/// Id of the event being handled.
pub const EVENT_ID: &str = "event_id";

/// Type tag of the event being handled.
pub const EVENT_TYPE: &str = "event_type";

// ─── Fan-out fields ────────────────────────────────────────────────────────

/// Subscribers that received an event.
pub const DELIVERED: &str = "delivered";

/// Subscribers skipped because their buffer was full or closed.
pub const SKIPPED: &str = "skipped";

/// Transport-side receivers reported by a publish.
pub const RECEIVERS: &str = "receivers";

// ─── History fields ────────────────────────────────────────────────────────

/// Namespaced list holding a key's history.
pub const LIST_KEY: &str = "list_key";

/// List length after an append.
pub const LIST_LEN: &str = "list_len";

/// Configured retention limit.
pub const RETENTION: &str = "retention";

/// Whether a history read may have lost events before the watermark.
pub const TRUNCATED: &str = "truncated";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message of an absorbed or returned failure.
pub const ERROR_MSG: &str = "error";

// ─── Subsystem values ──────────────────────────────────────────────────────

/// Queue facade (push, history reads).
pub const QUEUE: &str = "queue";

/// Distribution bridge read loop.
pub const BRIDGE: &str = "bridge";

/// History store append/trim/read.
pub const HISTORY: &str = "history";

/// Local fan-out registry.
pub const REGISTRY: &str = "registry";

/// Transport implementations.
pub const TRANSPORT: &str = "transport";
