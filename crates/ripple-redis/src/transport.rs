//! Redis-backed [`Transport`].
//!
//! Commands (PUBLISH, RPUSH, LTRIM, LRANGE) go through a shared
//! [`ConnectionManager`], which reconnects on its own after connection
//! loss. Pattern subscriptions each get a dedicated pub/sub connection,
//! since a connection in subscribe mode cannot issue other commands.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use ripple_core::{logging, Error, MessageStream, Result, Transport, TransportMessage};

use crate::config::RedisConfig;

/// Transport over a Redis server.
#[derive(Clone)]
pub struct RedisTransport {
    client: redis::Client,
    conn: ConnectionManager,
    io_timeout: Duration,
}

impl RedisTransport {
    /// Open a client and establish the command connection.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            Error::Config(format!("invalid Redis URL {}: {e}", config.redacted_url()))
        })?;

        let io_timeout = config.io_timeout();
        let conn = with_deadline(io_timeout, "connect", ConnectionManager::new(client.clone()))
            .await?;

        info!(
            subsystem = logging::TRANSPORT,
            url = %config.redacted_url(),
            io_timeout_ms = config.io_timeout_ms,
            "Redis transport connected"
        );

        Ok(Self {
            client,
            conn,
            io_timeout,
        })
    }
}

/// Run a Redis call under a deadline, mapping both failure kinds into [`Error`].
async fn with_deadline<T, F>(deadline: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Error::TransportUnavailable(format!("redis {op}: {e}"))),
        Err(_) => Err(Error::Timeout(format!(
            "redis {op} exceeded {}ms",
            deadline.as_millis()
        ))),
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        let receivers: i64 =
            with_deadline(self.io_timeout, "PUBLISH", conn.publish(topic, payload)).await?;
        debug!(subsystem = logging::TRANSPORT, topic, receivers, "Published");
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<MessageStream> {
        let mut pubsub =
            with_deadline(self.io_timeout, "pubsub connect", self.client.get_async_pubsub())
                .await?;
        // PSUBSCRIBE resolves once the server acknowledged the subscription.
        with_deadline(self.io_timeout, "PSUBSCRIBE", pubsub.psubscribe(pattern)).await?;
        info!(subsystem = logging::TRANSPORT, pattern, "Pattern subscription acknowledged");

        let stream = pubsub.into_on_message().map(|msg| TransportMessage {
            topic: msg.get_channel_name().to_string(),
            payload: msg.get_payload_bytes().to_vec(),
        });
        Ok(Box::pin(stream))
    }

    async fn list_append(&self, key: &str, value: &[u8]) -> Result<usize> {
        let mut conn = self.conn.clone();
        with_deadline(self.io_timeout, "RPUSH", conn.rpush(key, value)).await
    }

    async fn list_trim(&self, key: &str, start: isize, end: isize) -> Result<()> {
        let mut conn = self.conn.clone();
        with_deadline(self.io_timeout, "LTRIM", conn.ltrim(key, start, end)).await
    }

    async fn list_range(&self, key: &str, start: isize, end: isize) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn.clone();
        with_deadline(self.io_timeout, "LRANGE", conn.lrange(key, start, end)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_maps_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, redis::RedisError>(1)
        };
        let err = with_deadline(Duration::from_millis(10), "PUBLISH", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.to_string().contains("PUBLISH"));
    }

    #[tokio::test]
    async fn test_with_deadline_maps_redis_error() {
        let failing = async {
            Err::<i64, _>(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            )))
        };
        let err = with_deadline(Duration::from_secs(1), "RPUSH", failing)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransportUnavailable(_)));
    }

    #[tokio::test]
    async fn test_with_deadline_passes_value() {
        let ok = async { Ok::<_, redis::RedisError>(7usize) };
        assert_eq!(
            with_deadline(Duration::from_secs(1), "RPUSH", ok).await.unwrap(),
            7
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let config = RedisConfig::default().with_url("not-a-url");
        let err = RedisTransport::connect(&config).await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
