//! Queue configuration.

use ripple_core::defaults;

/// Configuration for a [`Queue`](crate::Queue).
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Prefix for transport topics and history list keys.
    pub namespace: String,
    /// Entries retained per key. 0 disables history.
    pub history_limit: usize,
    /// Channel capacity of each subscriber handle.
    pub subscriber_buffer: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            namespace: defaults::NAMESPACE.to_string(),
            history_limit: defaults::HISTORY_LIMIT,
            subscriber_buffer: defaults::SUBSCRIBER_BUFFER,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `RIPPLE_NAMESPACE` | `q.` | Topic and list key prefix |
    /// | `RIPPLE_HISTORY_LIMIT` | `100` | Entries kept per key (0 = no history) |
    /// | `RIPPLE_SUBSCRIBER_BUFFER` | `64` | Per-subscriber channel capacity |
    pub fn from_env() -> Self {
        let namespace =
            std::env::var("RIPPLE_NAMESPACE").unwrap_or_else(|_| defaults::NAMESPACE.to_string());

        let history_limit = std::env::var("RIPPLE_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::HISTORY_LIMIT);

        let subscriber_buffer = std::env::var("RIPPLE_SUBSCRIBER_BUFFER")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::SUBSCRIBER_BUFFER)
            .max(1);

        Self {
            namespace,
            history_limit,
            subscriber_buffer,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the retention limit. 0 disables history.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_subscriber_buffer(mut self, buffer: usize) -> Self {
        self.subscriber_buffer = buffer.max(1);
        self
    }
}
