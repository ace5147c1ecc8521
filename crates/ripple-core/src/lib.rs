//! # ripple-core
//!
//! Core types for the ripple real-time event distribution engine.
//!
//! This crate provides the pieces that have no dependency on a concrete
//! transport:
//! - [`Event`] and its compact wire codec
//! - [`DuplicateWindow`] for de-duplicating catch-up replay
//! - [`FanoutRegistry`] and [`Subscriber`] handles for local fan-out
//! - the [`Transport`] boundary implemented by `ripple-redis` and the
//!   in-process memory transport

pub mod dedup;
pub mod defaults;
pub mod error;
pub mod event;
pub mod logging;
pub mod registry;
pub mod sse;
pub mod transport;

// Re-export commonly used types at crate root
pub use dedup::DuplicateWindow;
pub use error::{Error, Result};
pub use event::{next_event_id, Event};
pub use registry::{
    Delivery, DeliveryReport, FanoutRegistry, SkipReason, Subscriber, SubscriberId,
};
pub use transport::{MessageStream, Transport, TransportMessage};
