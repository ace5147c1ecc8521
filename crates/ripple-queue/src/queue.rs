//! Queue facade: publish, replay and subscription handles.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use ripple_core::{
    logging, next_event_id, DuplicateWindow, Event, FanoutRegistry, Result, Subscriber, Transport,
};

use crate::bridge::{Bridge, BridgeHandle};
use crate::config::QueueConfig;
use crate::history::HistoryStore;

/// Result of a history read.
#[derive(Debug, Clone, Default, Serialize)]
pub struct History {
    /// Events newer than the requested watermark, oldest first.
    pub events: Vec<Event>,
    /// The retained window may not reach back to the watermark, so events
    /// between the watermark and the oldest returned event may be lost.
    ///
    /// Set when no entry was filtered out by the watermark and the store
    /// returned a full `limit` entries.
    pub truncated: bool,
    /// Id of the oldest entry that decoded within the newest `limit`
    /// stored entries, before watermark filtering.
    ///
    /// Older entries may still sit in the store until the next trim, and a
    /// malformed record at the front of the window is passed over.
    pub oldest_id: Option<i64>,
}

impl History {
    /// Drop events the consumer already saw live, recording the rest in `window`.
    pub fn retain_unseen(&mut self, window: &mut DuplicateWindow) {
        self.events.retain(|event| !window.check(event));
    }
}

/// Keyed event queue with local fan-out and optional bounded history.
///
/// Every process that serves subscribers calls [`listen`](Self::listen)
/// once; events pushed from any process then reach local subscribers
/// through the transport.
pub struct Queue {
    transport: Arc<dyn Transport>,
    registry: Arc<FanoutRegistry>,
    history: HistoryStore,
    config: QueueConfig,
}

impl Queue {
    /// Create a queue with its own fan-out registry.
    pub fn new(transport: Arc<dyn Transport>, config: QueueConfig) -> Self {
        Self::with_registry(transport, Arc::new(FanoutRegistry::new()), config)
    }

    /// Create a queue around an existing registry.
    pub fn with_registry(
        transport: Arc<dyn Transport>,
        registry: Arc<FanoutRegistry>,
        config: QueueConfig,
    ) -> Self {
        let history = HistoryStore::new(transport.clone(), config.history_limit);
        Self {
            transport,
            registry,
            history,
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FanoutRegistry> {
        &self.registry
    }

    /// Namespaced transport topic (and history list key) for `key`.
    pub fn topic(&self, key: &str) -> String {
        format!("{}{}", self.config.namespace, key)
    }

    /// Fresh timestamp-derived event id.
    pub fn event_id(&self) -> i64 {
        next_event_id()
    }

    /// Start the distribution bridge for this queue's namespace.
    ///
    /// Keep the handle to shut the bridge down; dropping it leaves the
    /// bridge running for the life of the transport subscription.
    #[must_use = "dropping the handle detaches the bridge; keep it to shut down"]
    pub async fn listen(&self) -> Result<BridgeHandle> {
        Bridge::new(
            self.transport.clone(),
            self.registry.clone(),
            self.config.namespace.clone(),
        )
        .start()
        .await
    }

    /// Publish `event` under its key, appending it to history first when
    /// `persist` is set and history is enabled.
    ///
    /// A history failure is logged and does not fail the push; a publish
    /// failure is returned since it means the event reached nobody.
    #[instrument(skip(self, event), fields(subsystem = logging::QUEUE, key = %event.key, event_id = event.id))]
    pub async fn push(&self, event: &Event, persist: bool) -> Result<()> {
        event.validate()?;
        let topic = self.topic(&event.key);
        let data = event.encode();

        if persist && self.history.is_enabled() {
            if let Err(e) = self.history.append_encoded(&topic, &data).await {
                warn!(error = %e, "Pushing history failed");
            }
        }

        self.transport.publish(&topic, &data).await?;
        debug!(event_type = %event.event_type, persist, "Pushed event");
        Ok(())
    }

    /// Events for `key` newer than `last_event_id`.
    ///
    /// Malformed entries are skipped. Fails with
    /// [`Error::HistoryUnavailable`](ripple_core::Error::HistoryUnavailable)
    /// when the queue keeps no history.
    #[instrument(skip(self), fields(subsystem = logging::QUEUE))]
    pub async fn history(&self, key: &str, last_event_id: i64) -> Result<History> {
        let entries = self.history.read(&self.topic(key)).await?;

        let mut history = History::default();
        let mut skipped = 0usize;
        for raw in &entries {
            let event = match Event::try_decode(raw) {
                Ok(event) => event.with_key(key),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed history entry");
                    continue;
                }
            };
            history.oldest_id.get_or_insert(event.id);
            if event.id <= last_event_id {
                skipped += 1;
                continue;
            }
            history.events.push(event);
        }
        history.truncated = skipped == 0 && entries.len() >= self.history.limit();

        debug!(
            entries = entries.len(),
            returned = history.events.len(),
            truncated = history.truncated,
            "Read history"
        );
        Ok(history)
    }

    /// Allocate a subscriber handle with no keys.
    pub fn chan(&self) -> Subscriber {
        Subscriber::new(self.registry.clone(), self.config.subscriber_buffer)
    }

    pub fn subscribe(&self, subscriber: &mut Subscriber, key: &str) {
        subscriber.subscribe(key);
    }

    pub fn unsubscribe(&self, subscriber: &mut Subscriber, key: &str) {
        subscriber.unsubscribe(key);
    }

    pub fn unsubscribe_all(&self, subscriber: &mut Subscriber) {
        subscriber.unsubscribe_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use ripple_core::Error;

    fn queue(limit: usize) -> (Arc<MemoryTransport>, Queue) {
        let transport = Arc::new(MemoryTransport::new());
        let queue = Queue::new(
            transport.clone(),
            QueueConfig::default().with_history_limit(limit),
        );
        (transport, queue)
    }

    async fn push_ids(queue: &Queue, key: &str, ids: &[i64]) {
        for id in ids {
            queue
                .push(&Event::new(*id, key, "msg", format!("m{id}")), true)
                .await
                .unwrap();
        }
    }

    fn event_ids(history: &History) -> Vec<i64> {
        history.events.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_topic_is_namespaced() {
        let (_, queue) = queue(5);
        assert_eq!(queue.topic("chat.1"), "q.chat.1");
    }

    #[tokio::test]
    async fn test_history_filters_by_watermark() {
        let (_, queue) = queue(10);
        push_ids(&queue, "k", &[3, 4, 5, 6, 7]).await;

        let history = queue.history("k", 5).await.unwrap();
        assert_eq!(event_ids(&history), vec![6, 7]);
        assert!(!history.truncated);
        assert_eq!(history.oldest_id, Some(3));
        assert!(history.events.iter().all(|e| e.key == "k"));
    }

    #[tokio::test]
    async fn test_history_truncated_when_window_too_short() {
        let (_, queue) = queue(3);
        push_ids(&queue, "k", &[1, 2, 3, 4, 5]).await;

        let history = queue.history("k", 1).await.unwrap();
        assert_eq!(event_ids(&history), vec![3, 4, 5]);
        assert!(history.truncated);
    }

    #[tokio::test]
    async fn test_history_not_truncated_when_partial() {
        let (_, queue) = queue(5);
        push_ids(&queue, "k", &[1, 2]).await;

        let history = queue.history("k", 0).await.unwrap();
        assert_eq!(event_ids(&history), vec![1, 2]);
        assert!(!history.truncated);
    }

    #[tokio::test]
    async fn test_history_skips_malformed() {
        let (transport, queue) = queue(10);
        push_ids(&queue, "k", &[1]).await;
        transport.list_append("q.k", b"garbage").await.unwrap();
        push_ids(&queue, "k", &[2]).await;

        let history = queue.history("k", 0).await.unwrap();
        assert_eq!(event_ids(&history), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_oldest_id_tracks_read_window() {
        let (transport, queue) = queue(3);
        push_ids(&queue, "k", &[1, 2]).await;
        transport.list_append("q.k", b"garbage").await.unwrap();
        push_ids(&queue, "k", &[3, 4]).await;

        // under the trim threshold, so 1 and 2 are still stored
        assert_eq!(transport.list_len("q.k"), 5);
        let history = queue.history("k", 0).await.unwrap();
        assert_eq!(history.oldest_id, Some(3));
        assert_eq!(event_ids(&history), vec![3, 4]);

        let empty = queue.history("other", 0).await.unwrap();
        assert_eq!(empty.oldest_id, None);
    }

    #[tokio::test]
    async fn test_history_unavailable_without_retention() {
        let (_, queue) = queue(0);
        assert!(matches!(
            queue.history("k", 0).await,
            Err(Error::HistoryUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_push_without_persist_skips_history() {
        let (transport, queue) = queue(5);
        queue
            .push(&Event::new(1, "k", "msg", "x"), false)
            .await
            .unwrap();
        assert_eq!(transport.list_len("q.k"), 0);
    }

    #[tokio::test]
    async fn test_push_publish_failure_returned() {
        let (transport, queue) = queue(5);
        transport.set_fail_publish(true);
        let err = queue
            .push(&Event::new(1, "k", "msg", "x"), true)
            .await
            .unwrap_err();
        assert!(err.is_transport());
        // the append happened before the publish attempt
        assert_eq!(transport.list_len("q.k"), 1);
    }

    #[tokio::test]
    async fn test_push_history_failure_swallowed() {
        let (transport, queue) = queue(5);
        transport.set_fail_append(true);
        queue
            .push(&Event::new(1, "k", "msg", "x"), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_push_rejects_unencodable_type() {
        let (_, queue) = queue(5);
        let err = queue
            .push(&Event::new(1, "k", "two words", "x"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedEvent(_)));
    }

    #[tokio::test]
    async fn test_retain_unseen() {
        let (_, queue) = queue(10);
        push_ids(&queue, "k", &[1, 2, 3]).await;

        let mut window = DuplicateWindow::new(8);
        // event 2 was already delivered live
        window.check(&Event::new(2, "k", "msg", "m2"));

        let mut history = queue.history("k", 0).await.unwrap();
        history.retain_unseen(&mut window);
        assert_eq!(event_ids(&history), vec![1, 3]);
    }

    #[test]
    fn test_chan_subscriptions_delegate_to_registry() {
        let (_, queue) = queue(5);
        let mut sub = queue.chan();
        queue.subscribe(&mut sub, "a");
        queue.subscribe(&mut sub, "b");
        assert_eq!(queue.registry().key_count(), 2);

        queue.unsubscribe(&mut sub, "a");
        assert_eq!(queue.registry().subscriber_count("a"), 0);

        queue.unsubscribe_all(&mut sub);
        assert_eq!(queue.registry().key_count(), 0);
    }
}
