//! # ripple-queue
//!
//! Keyed real-time event queue for ripple.
//!
//! This crate provides:
//! - [`Queue`]: push events, replay bounded history, hand out subscriber handles
//! - [`Bridge`]: the per-process transport subscription feeding local fan-out
//! - [`HistoryStore`]: amortized-trim bounded history per key
//! - [`MemoryTransport`]: in-process transport for tests and single-node use
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ripple_queue::{Event, Queue, QueueConfig};
//! use ripple_redis::{RedisConfig, RedisTransport};
//!
//! let transport = Arc::new(RedisTransport::connect(&RedisConfig::from_env()).await?);
//! let queue = Queue::new(transport, QueueConfig::from_env());
//! let _bridge = queue.listen().await?;
//!
//! // Connection layer: catch up, then stream live events
//! let mut sub = queue.chan();
//! queue.subscribe(&mut sub, "chat.1");
//! let history = queue.history("chat.1", last_seen_id).await?;
//!
//! // Producer
//! let event = Event::new(queue.event_id(), "chat.1", "msg", r#"{"text":"hi"}"#).with_session(100);
//! queue.push(&event, true).await?;
//! ```

pub mod bridge;
pub mod config;
pub mod history;
pub mod memory;
pub mod queue;

// Re-export core types
pub use ripple_core::*;

pub use bridge::{Bridge, BridgeHandle, BridgeState};
pub use config::QueueConfig;
pub use history::HistoryStore;
pub use memory::MemoryTransport;
pub use queue::{History, Queue};
