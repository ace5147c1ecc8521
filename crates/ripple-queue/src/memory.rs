//! In-process [`Transport`] for single-node deployments and tests.
//!
//! Lists follow Redis index semantics and pattern subscriptions use Redis
//! glob syntax (`*`, `?`, `\` escapes), so queue behavior is the same as
//! against a real server. Failure switches let tests exercise the error
//! paths of every transport operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::{future, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

use ripple_core::{defaults, logging, Error, MessageStream, Result, Transport, TransportMessage};

/// Memory-backed pub/sub and lists.
pub struct MemoryTransport {
    lists: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    /// `None` once [`close`](Self::close) was called.
    tx: Mutex<Option<broadcast::Sender<TransportMessage>>>,
    fail_publish: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_append: AtomicBool,
    fail_trim: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::with_capacity(defaults::MEMORY_TRANSPORT_CAPACITY)
    }

    /// `capacity` bounds how far a subscription stream may lag before it
    /// starts losing messages.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            lists: Mutex::new(HashMap::new()),
            tx: Mutex::new(Some(tx)),
            fail_publish: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            fail_append: AtomicBool::new(false),
            fail_trim: AtomicBool::new(false),
        }
    }

    /// Make `publish` fail.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Make `psubscribe` fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Make `list_append` fail.
    pub fn set_fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    /// Make `list_trim` fail.
    pub fn set_fail_trim(&self, fail: bool) {
        self.fail_trim.store(fail, Ordering::SeqCst);
    }

    /// Close pub/sub: existing subscription streams end after draining and
    /// further publish/subscribe calls fail.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Current length of the list at `key`.
    pub fn list_len(&self, key: &str) -> usize {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, Vec::len)
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(Error::TransportUnavailable(format!("memory {op}: injected failure")));
        }
        Ok(())
    }

    fn sender(&self) -> Result<broadcast::Sender<TransportMessage>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::TransportUnavailable("memory transport closed".to_string()))
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        Self::check(&self.fail_publish, "publish")?;
        let tx = self.sender()?;
        // No receivers is not an error, same as PUBLISH returning 0.
        let _ = tx.send(TransportMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<MessageStream> {
        Self::check(&self.fail_subscribe, "psubscribe")?;
        let rx = self.sender()?.subscribe();
        let pattern = pattern.to_string();

        let stream = BroadcastStream::new(rx).filter_map(move |item| {
            let msg = match item {
                Ok(msg) if glob_match(pattern.as_bytes(), msg.topic.as_bytes()) => Some(msg),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    warn!(
                        subsystem = logging::TRANSPORT,
                        pattern = %pattern,
                        missed,
                        "Memory subscription lagged"
                    );
                    None
                }
            };
            future::ready(msg)
        });
        Ok(Box::pin(stream))
    }

    async fn list_append(&self, key: &str, value: &[u8]) -> Result<usize> {
        Self::check(&self.fail_append, "list_append")?;
        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        let list = lists.entry(key.to_string()).or_default();
        list.push(value.to_vec());
        Ok(list.len())
    }

    async fn list_trim(&self, key: &str, start: isize, end: isize) -> Result<()> {
        Self::check(&self.fail_trim, "list_trim")?;
        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = lists.get_mut(key) else {
            return Ok(());
        };
        match resolve_range(list.len(), start, end) {
            Some((from, to)) => {
                list.truncate(to + 1);
                list.drain(..from);
            }
            None => {
                lists.remove(key);
            }
        }
        Ok(())
    }

    async fn list_range(&self, key: &str, start: isize, end: isize) -> Result<Vec<Vec<u8>>> {
        let lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        Ok(match resolve_range(list.len(), start, end) {
            Some((from, to)) => list[from..=to].to_vec(),
            None => Vec::new(),
        })
    }
}

/// Resolve Redis-style inclusive indices to an in-bounds range, or `None`
/// if the range is empty.
fn resolve_range(len: usize, start: isize, end: isize) -> Option<(usize, usize)> {
    let len = isize::try_from(len).ok()?;
    let from = (if start < 0 { len + start } else { start }).max(0);
    let to = (if end < 0 { len + end } else { end }).min(len - 1);
    if from > to || from >= len {
        return None;
    }
    Some((from as usize, to as usize))
}

/// Redis glob matching: `*` any run, `?` any byte, `\x` literal `x`.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position after the last `*` and the text index it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p + 1, t));
                p += 1;
                continue;
            }
            Some(b'?') => {
                p += 1;
                t += 1;
                continue;
            }
            Some(b'\\') if p + 1 < pattern.len() && pattern[p + 1] == text[t] => {
                p += 2;
                t += 1;
                continue;
            }
            Some(&c) if c != b'\\' && c == text[t] => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((star_p, star_t)) => {
                p = star_p;
                t = star_t + 1;
                backtrack = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    pattern[p.min(pattern.len())..].iter().all(|c| *c == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_glob_match() {
        assert!(glob_match(b"q.*", b"q.chat.1"));
        assert!(glob_match(b"q.*", b"q."));
        assert!(!glob_match(b"q.*", b"x.chat"));
        assert!(glob_match(b"*", b""));
        assert!(glob_match(b"a?c", b"abc"));
        assert!(!glob_match(b"a?c", b"ac"));
        assert!(glob_match(b"a*b*c", b"a-x-b-y-c"));
        assert!(!glob_match(b"a*b*c", b"a-x-c"));
        assert!(glob_match(b"\\*x", b"*x"));
        assert!(!glob_match(b"\\*x", b"yx"));
        assert!(glob_match(b"exact", b"exact"));
        assert!(!glob_match(b"exact", b"exactly"));
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(5, -3, -1), Some((2, 4)));
        assert_eq!(resolve_range(2, -10, -1), Some((0, 1)));
        assert_eq!(resolve_range(5, 1, 100), Some((1, 4)));
        assert_eq!(resolve_range(5, 3, 1), None);
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(5, 7, 9), None);
    }

    #[tokio::test]
    async fn test_list_append_trim_range() {
        let transport = MemoryTransport::new();
        for i in 0..6 {
            let len = transport
                .list_append("k", format!("{i}").as_bytes())
                .await
                .unwrap();
            assert_eq!(len, i + 1);
        }

        transport.list_trim("k", -2, -1).await.unwrap();
        assert_eq!(
            transport.list_range("k", 0, -1).await.unwrap(),
            vec![b"4".to_vec(), b"5".to_vec()]
        );

        transport.list_trim("k", 1, 0).await.unwrap();
        assert_eq!(transport.list_len("k"), 0);
        assert!(transport.list_range("missing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_psubscribe_filters_by_pattern() {
        let transport = MemoryTransport::new();
        let mut stream = transport.psubscribe("q.*").await.unwrap();

        transport.publish("other.1", b"skip").await.unwrap();
        transport.publish("q.chat", b"keep").await.unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.topic, "q.chat");
        assert_eq!(msg.payload, b"keep");
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let transport = MemoryTransport::new();
        let mut stream = transport.psubscribe("*").await.unwrap();
        transport.close();

        let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert!(next.is_none());
        assert!(transport.publish("t", b"x").await.is_err());
        assert!(transport.psubscribe("*").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let transport = MemoryTransport::new();
        transport.set_fail_publish(true);
        transport.set_fail_append(true);
        transport.set_fail_trim(true);
        transport.set_fail_subscribe(true);

        assert!(matches!(
            transport.publish("t", b"x").await,
            Err(Error::TransportUnavailable(_))
        ));
        assert!(transport.list_append("k", b"x").await.is_err());
        assert!(transport.list_trim("k", 0, -1).await.is_err());
        assert!(transport.psubscribe("*").await.is_err());

        transport.set_fail_publish(false);
        assert!(transport.publish("t", b"x").await.is_ok());
    }
}
