//! JSON wire envelope for collaboration sessions.
//!
//! Wire format (one JSON object per text frame):
//! ```text
//! {
//!   "type":      "cursor_move",            // required
//!   "user_id":   "u-42",                   // optional
//!   "timestamp": "2025-03-01T12:00:00Z",   // optional, ISO 8601
//!   "data":      { "x": 10.0, "y": 4.5 },  // optional payload
//!   ...                                    // type-specific fields
//! }
//! ```
//!
//! Outbound envelopes carry their payload as top-level fields; the server
//! re-broadcasts them with the original message nested under `data`. Typed
//! decoding therefore reads the payload from `data` when present and from
//! the top-level fields otherwise.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unknown event type: {0}")]
    UnknownType(String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: EventType, reason: String },
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Invalid collaboration address '{0}'")]
    InvalidAddress(String),
}

/// Accepted collaboration event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserJoined,
    UserLeft,
    Annotation,
    CursorMove,
    SelectionChange,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::UserJoined,
        EventType::UserLeft,
        EventType::Annotation,
        EventType::CursorMove,
        EventType::SelectionChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserJoined => "user_joined",
            EventType::UserLeft => "user_left",
            EventType::Annotation => "annotation",
            EventType::CursorMove => "cursor_move",
            EventType::SelectionChange => "selection_change",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownType(s.to_string()))
    }
}

/// Cursor position in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// Selected character range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Annotation attached to a span of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub document_path: String,
    pub annotation_type: String,
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub annotation_data: Map<String, Value>,
}

/// Type-specific part of a collaboration event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    UserJoined,
    UserLeft,
    Annotation(Annotation),
    CursorMove(CursorPosition),
    SelectionChange(SelectionRange),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::UserJoined => EventType::UserJoined,
            EventPayload::UserLeft => EventType::UserLeft,
            EventPayload::Annotation(_) => EventType::Annotation,
            EventPayload::CursorMove(_) => EventType::CursorMove,
            EventPayload::SelectionChange(_) => EventType::SelectionChange,
        }
    }
}

/// A typed collaboration event.
#[derive(Debug, Clone, PartialEq)]
pub struct CollaborationEvent {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl CollaborationEvent {
    /// Create an event stamped with the current time.
    pub fn now(user_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

/// Untyped message as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Type-specific top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            user_id: None,
            timestamp: None,
            data: None,
            extra: Map::new(),
        }
    }

    /// Parse a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The accepted event type, if this envelope carries one.
    pub fn event_type(&self) -> Option<EventType> {
        self.kind.parse().ok()
    }

    /// Payload object: `data` when present, otherwise the top-level fields.
    pub fn payload(&self) -> Value {
        match &self.data {
            Some(data) => data.clone(),
            None => Value::Object(self.extra.clone()),
        }
    }

    /// Build an outbound envelope from a typed event.
    pub fn from_event(event: &CollaborationEvent) -> Self {
        let mut envelope = Envelope::new(event.event_type().as_str());
        envelope.user_id = Some(event.user_id.clone());
        envelope.timestamp = Some(event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true));

        let fields = match &event.payload {
            EventPayload::UserJoined | EventPayload::UserLeft => None,
            EventPayload::Annotation(a) => serde_json::to_value(a).ok(),
            EventPayload::CursorMove(c) => serde_json::to_value(c).ok(),
            EventPayload::SelectionChange(s) => serde_json::to_value(s).ok(),
        };
        if let Some(Value::Object(fields)) = fields {
            envelope.extra = fields;
        }
        envelope
    }

    /// Convert to a typed event.
    ///
    /// A missing timestamp is read as "now".
    pub fn to_event(&self) -> Result<CollaborationEvent, ProtocolError> {
        let kind: EventType = self.kind.parse()?;
        let user_id = self
            .user_id
            .clone()
            .ok_or(ProtocolError::MissingField("user_id"))?;
        let timestamp = match &self.timestamp {
            Some(ts) => parse_timestamp(ts)?,
            None => Utc::now(),
        };

        let payload = match kind {
            EventType::UserJoined => EventPayload::UserJoined,
            EventType::UserLeft => EventPayload::UserLeft,
            EventType::Annotation => EventPayload::Annotation(self.typed_payload(kind)?),
            EventType::CursorMove => EventPayload::CursorMove(self.typed_payload(kind)?),
            EventType::SelectionChange => {
                EventPayload::SelectionChange(self.typed_payload(kind)?)
            }
        };

        Ok(CollaborationEvent { user_id, timestamp, payload })
    }

    fn typed_payload<T: serde::de::DeserializeOwned>(&self, kind: EventType) -> Result<T, ProtocolError> {
        serde_json::from_value(self.payload()).map_err(|e| ProtocolError::InvalidPayload {
            kind,
            reason: e.to_string(),
        })
    }
}

/// Parse an ISO 8601 timestamp.
///
/// Accepts RFC 3339 with an offset, and naive date-times which are read
/// as UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ProtocolError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| ProtocolError::InvalidTimestamp(text.to_string()))
}

/// Build the session address `{base}/collaboration/ws/{session}?user_id={user}`.
///
/// Only `ws` and `wss` bases are accepted.
pub fn session_url(base: &str, session_id: &str, user_id: &str) -> Result<String, ProtocolError> {
    let invalid = || ProtocolError::InvalidAddress(base.to_string());
    let mut url = Url::parse(base).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(invalid());
    }

    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(["collaboration", "ws", session_id]);
    url.query_pairs_mut().clear().append_pair("user_id", user_id);
    Ok(url.into())
}

/// A fresh anonymous user id, `user-` followed by 8 hex digits.
pub fn anonymous_user_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("user-{}", &id[..8])
}
