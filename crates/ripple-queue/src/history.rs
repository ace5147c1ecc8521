//! Bounded, replayable per-key history.
//!
//! Each key's history is an append-only list on the transport. Appends are
//! cheap; the list is only trimmed back to `limit` entries once it grows
//! past `HISTORY_TRIM_FACTOR * limit`, so a trim is paid once per `limit`
//! appends rather than on every write. Readers only ever look at the newest
//! `limit` entries, so the slack is invisible to them.

use std::sync::Arc;

use tracing::{debug, warn};

use ripple_core::defaults::HISTORY_TRIM_FACTOR;
use ripple_core::{logging, Error, Event, Result, Transport};

/// History store over a transport's list operations.
#[derive(Clone)]
pub struct HistoryStore {
    transport: Arc<dyn Transport>,
    limit: usize,
}

impl HistoryStore {
    /// `limit` of 0 turns appends into no-ops and reads into errors.
    pub fn new(transport: Arc<dyn Transport>, limit: usize) -> Self {
        Self { transport, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Serialize `event` and append it to the list at `list_key`.
    pub async fn append(&self, list_key: &str, event: &Event) -> Result<()> {
        self.append_encoded(list_key, &event.encode()).await
    }

    /// Append an already-encoded entry.
    ///
    /// Only the append itself can fail; a failed trim is logged and left for
    /// the next append past the threshold to retry.
    pub async fn append_encoded(&self, list_key: &str, entry: &[u8]) -> Result<()> {
        if self.limit == 0 {
            return Ok(());
        }

        let len = self.transport.list_append(list_key, entry).await?;
        if len > self.limit.saturating_mul(HISTORY_TRIM_FACTOR) {
            let keep = isize::try_from(self.limit).unwrap_or(isize::MAX);
            match self.transport.list_trim(list_key, -keep, -1).await {
                Ok(()) => debug!(
                    subsystem = logging::HISTORY,
                    list_key,
                    list_len = len,
                    retention = self.limit,
                    "Trimmed history"
                ),
                Err(e) => warn!(
                    subsystem = logging::HISTORY,
                    list_key,
                    list_len = len,
                    error = %e,
                    "History trim failed"
                ),
            }
        }
        Ok(())
    }

    /// The newest `limit` raw entries, oldest first.
    pub async fn read(&self, list_key: &str) -> Result<Vec<Vec<u8>>> {
        if self.limit == 0 {
            return Err(Error::HistoryUnavailable);
        }
        let keep = isize::try_from(self.limit).unwrap_or(isize::MAX);
        self.transport.list_range(list_key, -keep, -1).await
    }
}
