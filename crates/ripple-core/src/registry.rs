//! In-process fan-out registry and subscriber handles.
//!
//! The registry maps a topic key to the set of subscriber channels
//! registered under it. It is shared by every subscriber handle and by the
//! distribution bridge, and is guarded by one reader/writer lock: delivery
//! takes the read side, subscribe/unsubscribe take the write side. The lock
//! is only held for the map access itself; sends use `try_send` and never
//! wait on a consumer.
//!
//! # Backpressure
//!
//! A subscriber whose buffer is full is skipped for that event and reported
//! as [`Delivery::Skipped`]. Slow consumers therefore miss live events and
//! must catch up from history after reconnecting; the delivery path never
//! stalls on one subscriber.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::event::Event;
use crate::logging;

/// Unique identifier for a subscriber handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a live delivery was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The subscriber's buffer is full.
    Full,
    /// The subscriber's receiver is gone.
    Closed,
}

/// Outcome of offering one event to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Skipped(SkipReason),
}

/// Per-subscriber outcomes of a single [`FanoutRegistry::deliver`] call.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub outcomes: Vec<(SubscriberId, Delivery)>,
}

impl DeliveryReport {
    /// Number of subscribers that received the event.
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, d)| *d == Delivery::Delivered)
            .count()
    }

    /// Number of subscribers that were skipped.
    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    /// Outcome for a specific subscriber, if it was registered under the key.
    pub fn outcome(&self, id: SubscriberId) -> Option<Delivery> {
        self.outcomes
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, d)| *d)
    }
}

type Channels = HashMap<SubscriberId, mpsc::Sender<Event>>;

/// Thread-safe map from topic key to subscriber channels.
#[derive(Default)]
pub struct FanoutRegistry {
    topics: RwLock<HashMap<String, Channels>>,
}

impl FanoutRegistry {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Register a channel under `key`. Idempotent; returns `true` if newly added.
    pub fn subscribe(&self, id: SubscriberId, sender: &mpsc::Sender<Event>, key: &str) -> bool {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let added = topics
            .entry(key.to_string())
            .or_default()
            .insert(id, sender.clone())
            .is_none();
        debug!(subsystem = logging::REGISTRY, key, subscriber_id = %id, added, "Subscribed");
        added
    }

    /// Remove a channel from `key`, dropping the key once it has no channels.
    /// Returns `true` if the channel was registered.
    pub fn unsubscribe(&self, id: SubscriberId, key: &str) -> bool {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let Some(channels) = topics.get_mut(key) else {
            return false;
        };
        let removed = channels.remove(&id).is_some();
        if channels.is_empty() {
            topics.remove(key);
        }
        debug!(subsystem = logging::REGISTRY, key, subscriber_id = %id, removed, "Unsubscribed");
        removed
    }

    /// Offer `event` to every channel registered under `key` without blocking.
    pub fn deliver(&self, key: &str, event: &Event) -> DeliveryReport {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let Some(channels) = topics.get(key) else {
            return DeliveryReport::default();
        };

        let outcomes: Vec<_> = channels
            .iter()
            .map(|(id, sender)| {
                let delivery = match sender.try_send(event.clone()) {
                    Ok(()) => Delivery::Delivered,
                    Err(TrySendError::Full(_)) => Delivery::Skipped(SkipReason::Full),
                    Err(TrySendError::Closed(_)) => Delivery::Skipped(SkipReason::Closed),
                };
                (*id, delivery)
            })
            .collect();
        drop(topics);

        let report = DeliveryReport { outcomes };
        trace!(
            subsystem = logging::REGISTRY,
            key,
            event_id = event.id,
            delivered = report.delivered(),
            skipped = report.skipped(),
            "Fan-out"
        );
        report
    }

    /// Number of channels registered under `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.get(key).map_or(0, HashMap::len)
    }

    /// Number of keys with at least one channel.
    pub fn key_count(&self) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A subscriber's receive channel plus the keys it is registered under.
///
/// Only the owner reads the channel; only the registry writes it. Dropping
/// the handle unsubscribes it from every key.
pub struct Subscriber {
    id: SubscriberId,
    registry: Arc<FanoutRegistry>,
    tx: mpsc::Sender<Event>,
    rx: mpsc::Receiver<Event>,
    keys: HashSet<String>,
}

impl Subscriber {
    /// Allocate a handle with room for `buffer` undelivered events (minimum 1).
    pub fn new(registry: Arc<FanoutRegistry>, buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        Self {
            id: SubscriberId::new(),
            registry,
            tx,
            rx,
            keys: HashSet::new(),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn subscribe(&mut self, key: &str) {
        self.registry.subscribe(self.id, &self.tx, key);
        self.keys.insert(key.to_string());
    }

    pub fn unsubscribe(&mut self, key: &str) {
        self.registry.unsubscribe(self.id, key);
        self.keys.remove(key);
    }

    pub fn unsubscribe_all(&mut self) {
        for key in self.keys.drain() {
            self.registry.unsubscribe(self.id, &key);
        }
    }

    pub fn is_subscribed(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Wait for the next live event.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next live event if one is buffered.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("keys", &self.keys)
            .finish()
    }
}
