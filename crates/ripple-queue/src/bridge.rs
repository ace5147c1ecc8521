//! Distribution bridge: transport pattern subscription to local fan-out.
//!
//! One bridge runs per process. It subscribes to `<namespace>*`, strips the
//! namespace from each message's topic to recover the key, decodes the
//! payload and hands the event to the [`FanoutRegistry`]. Malformed records
//! are logged and dropped; nothing from the read loop ever reaches the
//! transport as an error.
//!
//! ```text
//! Idle -> Subscribing -> Listening -> Terminated
//!              |                          ^
//!              +---- subscribe failed ----+
//! ```

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use ripple_core::{
    logging, DeliveryReport, Error, Event, FanoutRegistry, MessageStream, Result, Transport,
    TransportMessage,
};

/// Lifecycle of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Subscribing,
    Listening,
    Terminated,
}

/// Bridge between a transport subscription and the local registry.
pub struct Bridge {
    transport: Arc<dyn Transport>,
    registry: Arc<FanoutRegistry>,
    namespace: String,
    state: watch::Sender<BridgeState>,
}

impl Bridge {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<FanoutRegistry>,
        namespace: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(BridgeState::Idle);
        Self {
            transport,
            registry,
            namespace: namespace.into(),
            state,
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Pattern covering every topic in the namespace.
    pub fn pattern(&self) -> String {
        format!("{}*", self.namespace)
    }

    /// Subscribe and start the read loop on its own task.
    ///
    /// Returns once the transport acknowledged the subscription. A failure
    /// here means the process cannot serve real-time events and must not
    /// claim to; it is returned as [`Error::TransportUnavailable`].
    ///
    /// The read loop outlives the returned handle: dropping it detaches the
    /// bridge, which then runs until the transport ends the stream.
    #[must_use = "dropping the handle detaches the bridge; keep it to shut down"]
    pub async fn start(self) -> Result<BridgeHandle> {
        let pattern = self.pattern();
        self.state.send_replace(BridgeState::Subscribing);

        let stream = match self.transport.psubscribe(&pattern).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state.send_replace(BridgeState::Terminated);
                error!(
                    subsystem = logging::BRIDGE,
                    pattern = %pattern,
                    error = %e,
                    "Bridge subscription failed"
                );
                return Err(match e {
                    Error::TransportUnavailable(_) => e,
                    other => Error::TransportUnavailable(other.to_string()),
                });
            }
        };

        self.state.send_replace(BridgeState::Listening);
        info!(subsystem = logging::BRIDGE, pattern = %pattern, "Bridge listening");

        let state = self.state.subscribe();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.run(stream, shutdown_rx));

        Ok(BridgeHandle {
            state,
            shutdown_tx,
            task,
        })
    }

    async fn run(self, mut stream: MessageStream, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut handle_alive = true;
        loop {
            tokio::select! {
                signal = shutdown_rx.recv(), if handle_alive => match signal {
                    Some(()) => {
                        info!(subsystem = logging::BRIDGE, "Bridge received shutdown signal");
                        break;
                    }
                    None => {
                        debug!(subsystem = logging::BRIDGE, "Bridge handle dropped, running detached");
                        handle_alive = false;
                    }
                },
                next = stream.next() => match next {
                    Some(msg) => {
                        self.dispatch(msg);
                    }
                    None => {
                        warn!(subsystem = logging::BRIDGE, "Bridge transport stream ended");
                        break;
                    }
                },
            }
        }

        // Dropping the stream closes the transport subscription.
        drop(stream);
        self.state.send_replace(BridgeState::Terminated);
        info!(subsystem = logging::BRIDGE, "Bridge terminated");
    }

    /// Route one transport message to local subscribers.
    ///
    /// Returns `None` when the message was dropped (foreign topic, no local
    /// subscribers, or malformed payload).
    pub fn dispatch(&self, msg: TransportMessage) -> Option<DeliveryReport> {
        let Some(key) = msg.topic.strip_prefix(self.namespace.as_str()) else {
            warn!(
                subsystem = logging::BRIDGE,
                topic = %msg.topic,
                "Message outside bridge namespace dropped"
            );
            return None;
        };

        if self.registry.subscriber_count(key) == 0 {
            trace!(subsystem = logging::BRIDGE, key, "No local subscribers");
            return None;
        }

        let event = match Event::try_decode(&msg.payload) {
            Ok(event) => event.with_key(key),
            Err(e) => {
                warn!(
                    subsystem = logging::BRIDGE,
                    key,
                    error = %e,
                    "Dropping malformed event"
                );
                return None;
            }
        };

        let report = self.registry.deliver(key, &event);
        debug!(
            subsystem = logging::BRIDGE,
            key,
            event_id = event.id,
            event_type = %event.event_type,
            delivered = report.delivered(),
            skipped = report.skipped(),
            "Bridged event"
        );
        Some(report)
    }
}

/// Handle for a running bridge.
#[must_use = "dropping the handle detaches the bridge; keep it to shut down"]
pub struct BridgeHandle {
    state: watch::Receiver<BridgeState>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == BridgeState::Listening
    }

    /// Wait until the read loop has exited.
    pub async fn terminated(&mut self) {
        let _ = self
            .state
            .wait_for(|state| *state == BridgeState::Terminated)
            .await;
    }

    /// Close the transport subscription and wait for the read loop to exit.
    pub async fn shutdown(self) -> Result<()> {
        // The loop may already be gone if the transport ended the stream.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("bridge task failed: {e}")))
    }
}
