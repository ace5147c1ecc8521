//! The external pub/sub and list-store boundary.
//!
//! The queue depends on exactly these five operations and nothing else
//! about the product behind them, so Redis and the in-process memory
//! transport are interchangeable.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;

/// A message received from a pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    /// Full topic the message was published on.
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Stream of messages from a pattern subscription. It ends when the
/// subscription is closed or the connection is lost.
pub type MessageStream = Pin<Box<dyn Stream<Item = TransportMessage> + Send>>;

/// Pub/sub plus ordered-list operations provided by the transport.
///
/// List indices follow Redis conventions: inclusive on both ends, negative
/// values count from the tail (`-1` is the last element).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;

    /// Subscribe to every topic matching a glob `pattern`.
    ///
    /// Returns only after the transport acknowledged the subscription.
    async fn psubscribe(&self, pattern: &str) -> Result<MessageStream>;

    /// Append `value` to the list at `key`, returning the new length.
    async fn list_append(&self, key: &str, value: &[u8]) -> Result<usize>;

    /// Keep only the elements in `start..=end`.
    async fn list_trim(&self, key: &str, start: isize, end: isize) -> Result<()>;

    /// Elements in `start..=end`, oldest first.
    async fn list_range(&self, key: &str, start: isize, end: isize) -> Result<Vec<Vec<u8>>>;
}
