//! Redis connection configuration.

use std::time::Duration;

use ripple_core::defaults;

/// Configuration for [`RedisTransport`](crate::RedisTransport).
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL (`redis://[user:pass@]host:port[/db]`).
    pub url: String,
    /// Deadline for each publish and list call, in milliseconds.
    pub io_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: defaults::REDIS_URL.to_string(),
            io_timeout_ms: defaults::TRANSPORT_IO_TIMEOUT_MS,
        }
    }
}

impl RedisConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `REDIS_URL` | `redis://localhost:6379` | Connection URL |
    /// | `REDIS_IO_TIMEOUT_MS` | `2000` | Per-call I/O deadline |
    pub fn from_env() -> Self {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| defaults::REDIS_URL.to_string());

        let io_timeout_ms = std::env::var("REDIS_IO_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(defaults::TRANSPORT_IO_TIMEOUT_MS);

        Self { url, io_timeout_ms }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the per-call deadline. Zero is clamped to 1ms so calls never wait forever.
    pub fn with_io_timeout_ms(mut self, ms: u64) -> Self {
        self.io_timeout_ms = ms.max(1);
        self
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// URL with credentials masked, safe for logs.
    pub fn redacted_url(&self) -> String {
        match (self.url.find("://"), self.url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***{}", &self.url[..scheme_end], &self.url[at..])
            }
            _ => self.url.clone(),
        }
    }
}
