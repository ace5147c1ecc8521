//! Event type and its compact wire encoding.
//!
//! An event travels over the transport and sits in history as a single
//! byte string:
//!
//! ```text
//! <id>[:<session_id>[:<user_id>]] <type> <payload>
//! ```
//!
//! Optional provenance fields are omitted from the tail of the prefix when
//! they are zero. The payload is opaque and may itself contain spaces or
//! newlines; only the first two spaces are separators.

use std::borrow::Cow;

use chrono::Utc;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// The unit of distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Caller-supplied id, used as a per-key watermark.
    pub id: i64,
    /// Un-namespaced topic key. Not part of the wire encoding.
    pub key: String,
    /// Short type tag understood by consumers. Must not contain spaces.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Authoring user, 0 when absent.
    pub user_id: i64,
    /// Authoring session, 0 when absent.
    pub session_id: i64,
    /// Opaque payload.
    #[serde(serialize_with = "serialize_payload")]
    pub payload: Vec<u8>,
}

fn serialize_payload<S: Serializer>(payload: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(payload))
}

impl Event {
    /// Create an event without provenance fields.
    pub fn new(
        id: i64,
        key: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id,
            key: key.into(),
            event_type: event_type.into(),
            user_id: 0,
            session_id: 0,
            payload: payload.into(),
        }
    }

    /// Set the authoring session.
    pub fn with_session(mut self, session_id: i64) -> Self {
        self.session_id = session_id;
        self
    }

    /// Set the authoring user.
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }

    /// Set the key (decoded events come back without one).
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Payload as text, replacing invalid UTF-8.
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Reject events whose type would not survive a round trip.
    pub fn validate(&self) -> Result<()> {
        if self.event_type.contains(' ') {
            return Err(Error::MalformedEvent(format!(
                "event type {:?} contains a space",
                self.event_type
            )));
        }
        Ok(())
    }

    /// Serialize into the wire form.
    pub fn encode(&self) -> Vec<u8> {
        let prefix = match (self.session_id, self.user_id) {
            (0, 0) => self.id.to_string(),
            (session_id, 0) => format!("{}:{}", self.id, session_id),
            (session_id, user_id) => format!("{}:{}:{}", self.id, session_id, user_id),
        };

        let mut out =
            Vec::with_capacity(prefix.len() + self.event_type.len() + self.payload.len() + 2);
        out.extend_from_slice(prefix.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.event_type.as_bytes());
        out.push(b' ');
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse the wire form, returning `None` for malformed records.
    ///
    /// The decoded event has an empty key.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        Self::try_decode(raw).ok()
    }

    /// Parse the wire form, reporting why a record is malformed.
    pub fn try_decode(raw: &[u8]) -> Result<Self> {
        let mut fields = raw.splitn(3, |b| *b == b' ');
        let (prefix, event_type, payload) = match (fields.next(), fields.next(), fields.next()) {
            (Some(prefix), Some(event_type), Some(payload)) => (prefix, event_type, payload),
            _ => {
                return Err(Error::MalformedEvent(
                    "expected `<id> <type> <payload>`".to_string(),
                ))
            }
        };

        let prefix = std::str::from_utf8(prefix)
            .map_err(|_| Error::MalformedEvent("id prefix is not UTF-8".to_string()))?;
        let (id, session_id, user_id) = parse_prefix(prefix)?;

        let event_type = std::str::from_utf8(event_type)
            .map_err(|_| Error::MalformedEvent("event type is not UTF-8".to_string()))?;

        Ok(Self {
            id,
            key: String::new(),
            event_type: event_type.to_string(),
            user_id,
            session_id,
            payload: payload.to_vec(),
        })
    }
}

/// Split `id[:session[:user]]`, defaulting absent trailing fields to 0.
fn parse_prefix(prefix: &str) -> Result<(i64, i64, i64)> {
    let mut values = [0i64; 3];
    for (slot, part) in values.iter_mut().zip(prefix.splitn(3, ':')) {
        *slot = part
            .parse()
            .map_err(|_| Error::MalformedEvent(format!("invalid id field {part:?}")))?;
    }
    Ok((values[0], values[1], values[2]))
}

/// Timestamp-derived event id (UNIX time in microseconds).
///
/// For producers that have no per-key sequence of their own.
pub fn next_event_id() -> i64 {
    Utc::now().timestamp_micros()
}
