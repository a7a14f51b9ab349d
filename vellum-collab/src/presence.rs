//! Presence tracking for a collaboration session.
//!
//! Keeps "who is here and where are they" for one participant's view of a
//! shared document: remote cursors and selections, annotations, and a
//! bounded history of recent events.
//!
//! ```text
//! inbound Envelope
//!       │  to_event()
//!       ▼
//! CollaborationSession::apply()
//!       │
//!       ├── participants  (join / leave / cursor / selection)
//!       ├── annotations
//!       └── EventLog      (ring buffer, most recent N)
//!
//! local action ──► cursor_moved() / annotate() / … ──► outbound Envelope
//!                  (cursor rate-limited to 30 per second)
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{
    Annotation, CollaborationEvent, CursorPosition, Envelope, EventPayload, ProtocolError,
    SelectionRange,
};

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Events kept in the history ring buffer.
    pub history_capacity: usize,
    /// Minimum interval between two outbound cursor moves.
    pub cursor_interval: Duration,
    /// Participants silent for longer than this are pruned.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            cursor_interval: Duration::from_millis(33),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Fixed-capacity event history. The oldest event is evicted first.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<CollaborationEvent>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an event, evicting the oldest when full.
    pub fn push(&mut self, event: CollaborationEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Events from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &CollaborationEvent> {
        self.events.iter()
    }

    /// The `n` most recent events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&CollaborationEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// A remote participant as seen locally.
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    /// Timestamp of the participant's latest event.
    pub last_seen: DateTime<Utc>,
    pub cursor: Option<CursorPosition>,
    pub selection: Option<SelectionRange>,
    last_activity: Instant,
}

impl Participant {
    fn new(user_id: String, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            joined_at: at,
            last_seen: at,
            cursor: None,
            selection: None,
            last_activity: Instant::now(),
        }
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_seen {
            self.last_seen = at;
        }
        self.last_activity = Instant::now();
    }

    /// Whether nothing was heard from this participant for `timeout`.
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// An annotation together with its author.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub annotation: Annotation,
}

/// One participant's view of a collaboration session.
pub struct CollaborationSession {
    local_user_id: String,
    participants: HashMap<String, Participant>,
    annotations: Vec<AnnotationRecord>,
    history: EventLog,
    last_cursor_broadcast: Option<Instant>,
    local_cursor: Option<CursorPosition>,
    config: SessionConfig,
}

impl CollaborationSession {
    pub fn new(local_user_id: impl Into<String>) -> Self {
        Self::with_config(local_user_id, SessionConfig::default())
    }

    pub fn with_config(local_user_id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            participants: HashMap::new(),
            annotations: Vec::new(),
            history: EventLog::new(config.history_capacity),
            last_cursor_broadcast: None,
            local_cursor: None,
            config,
        }
    }

    /// Apply a remote event. Returns `false` for our own echoes.
    pub fn apply(&mut self, event: CollaborationEvent) -> bool {
        if event.user_id == self.local_user_id {
            return false;
        }

        let user_id = event.user_id.clone();
        let at = event.timestamp;
        match &event.payload {
            EventPayload::UserJoined => {
                self.participants
                    .entry(user_id.clone())
                    .and_modify(|p| p.touch(at))
                    .or_insert_with(|| Participant::new(user_id, at));
            }
            EventPayload::UserLeft => {
                self.participants.remove(&user_id);
            }
            EventPayload::CursorMove(position) => {
                self.participant_mut(user_id, at).cursor = Some(*position);
            }
            EventPayload::SelectionChange(range) => {
                self.participant_mut(user_id, at).selection = Some(range.clone());
            }
            EventPayload::Annotation(annotation) => {
                self.participant_mut(user_id.clone(), at);
                self.annotations.push(AnnotationRecord {
                    user_id,
                    created_at: at,
                    annotation: annotation.clone(),
                });
            }
        }

        self.history.push(event);
        true
    }

    /// Decode and apply an inbound envelope.
    ///
    /// Envelopes of unknown type (such as server error reports) are not
    /// applied and surface as `UnknownType`.
    pub fn apply_envelope(&mut self, envelope: &Envelope) -> Result<bool, ProtocolError> {
        let event = envelope.to_event()?;
        Ok(self.apply(event))
    }

    /// Look up a participant, creating a placeholder for a missed join.
    fn participant_mut(&mut self, user_id: String, at: DateTime<Utc>) -> &mut Participant {
        let participant = self
            .participants
            .entry(user_id.clone())
            .or_insert_with(|| Participant::new(user_id, at));
        participant.touch(at);
        participant
    }

    fn local_envelope(&self, payload: EventPayload) -> Envelope {
        Envelope::from_event(&CollaborationEvent::now(self.local_user_id.clone(), payload))
    }

    pub fn join_message(&self) -> Envelope {
        self.local_envelope(EventPayload::UserJoined)
    }

    pub fn leave_message(&self) -> Envelope {
        self.local_envelope(EventPayload::UserLeft)
    }

    /// Record a local cursor move; returns the envelope unless throttled.
    pub fn cursor_moved(&mut self, x: f64, y: f64) -> Option<Envelope> {
        self.local_cursor = Some(CursorPosition { x, y });
        let throttled = self
            .last_cursor_broadcast
            .is_some_and(|last| last.elapsed() < self.config.cursor_interval);
        if throttled {
            return None;
        }
        self.last_cursor_broadcast = Some(Instant::now());
        Some(self.local_envelope(EventPayload::CursorMove(CursorPosition { x, y })))
    }

    /// Broadcast the last local cursor position regardless of throttling.
    pub fn force_cursor(&mut self) -> Envelope {
        self.last_cursor_broadcast = Some(Instant::now());
        let position = self.local_cursor.unwrap_or_default();
        self.local_envelope(EventPayload::CursorMove(position))
    }

    pub fn selection_changed(&self, start: usize, end: usize, text: Option<String>) -> Envelope {
        self.local_envelope(EventPayload::SelectionChange(SelectionRange { start, end, text }))
    }

    /// Record a local annotation and return the envelope announcing it.
    ///
    /// The server does not echo messages back to their sender, so the
    /// annotation is kept locally here.
    pub fn annotate(&mut self, annotation: Annotation) -> Envelope {
        let event = CollaborationEvent::now(
            self.local_user_id.clone(),
            EventPayload::Annotation(annotation.clone()),
        );
        self.annotations.push(AnnotationRecord {
            user_id: self.local_user_id.clone(),
            created_at: event.timestamp,
            annotation,
        });
        let envelope = Envelope::from_event(&event);
        self.history.push(event);
        envelope
    }

    /// Remove participants idle for longer than the configured timeout.
    pub fn prune_idle(&mut self) -> Vec<String> {
        let timeout = self.config.idle_timeout;
        let stale: Vec<String> = self
            .participants
            .values()
            .filter(|p| p.is_idle(timeout))
            .map(|p| p.user_id.clone())
            .collect();
        for id in &stale {
            self.participants.remove(id);
        }
        stale
    }

    /// Forget everything (disconnect or unmount).
    pub fn clear(&mut self) {
        self.participants.clear();
        self.annotations.clear();
        self.history.clear();
        self.last_cursor_broadcast = None;
        self.local_cursor = None;
    }

    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.get(user_id)
    }

    /// Remote participants sorted by user id.
    pub fn participants(&self) -> Vec<&Participant> {
        let mut list: Vec<_> = self.participants.values().collect();
        list.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        list
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn annotations(&self) -> &[AnnotationRecord] {
        &self.annotations
    }

    pub fn history(&self) -> &EventLog {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EventType;

    fn event(user: &str, payload: EventPayload) -> CollaborationEvent {
        CollaborationEvent::now(user, payload)
    }

    fn annotation(kind: &str) -> Annotation {
        Annotation {
            document_path: "policies/access.md".into(),
            annotation_type: kind.into(),
            start_offset: 0,
            end_offset: 5,
            text_content: "note".into(),
            annotation_data: Default::default(),
        }
    }

    #[test]
    fn test_join_and_leave() {
        let mut session = CollaborationSession::new("me");
        assert!(session.apply(event("alice", EventPayload::UserJoined)));
        assert!(session.apply(event("bob", EventPayload::UserJoined)));
        assert_eq!(session.participant_count(), 2);

        session.apply(event("alice", EventPayload::UserLeft));
        assert!(session.participant("alice").is_none());
        let ids: Vec<_> = session.participants().iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["bob"]);
    }

    #[test]
    fn test_own_events_ignored() {
        let mut session = CollaborationSession::new("me");
        assert!(!session.apply(event("me", EventPayload::UserJoined)));
        assert_eq!(session.participant_count(), 0);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_cursor_from_unknown_peer_creates_placeholder() {
        let mut session = CollaborationSession::new("me");
        session.apply(event("carol", EventPayload::CursorMove(CursorPosition { x: 3.0, y: 4.0 })));
        let carol = session.participant("carol").unwrap();
        assert_eq!(carol.cursor, Some(CursorPosition { x: 3.0, y: 4.0 }));
    }

    #[test]
    fn test_selection_update() {
        let mut session = CollaborationSession::new("me");
        session.apply(event("dan", EventPayload::UserJoined));
        session.apply(event(
            "dan",
            EventPayload::SelectionChange(SelectionRange { start: 4, end: 9, text: None }),
        ));
        let dan = session.participant("dan").unwrap();
        assert_eq!(dan.selection.as_ref().map(|s| (s.start, s.end)), Some((4, 9)));
    }

    #[test]
    fn test_remote_and_local_annotations() {
        let mut session = CollaborationSession::new("me");
        session.apply(event("erin", EventPayload::Annotation(annotation("comment"))));
        let envelope = session.annotate(annotation("highlight"));

        assert_eq!(envelope.event_type(), Some(EventType::Annotation));
        assert_eq!(envelope.user_id.as_deref(), Some("me"));
        let authors: Vec<_> = session.annotations().iter().map(|a| a.user_id.as_str()).collect();
        assert_eq!(authors, vec!["erin", "me"]);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let config = SessionConfig { history_capacity: 3, ..SessionConfig::default() };
        let mut session = CollaborationSession::with_config("me", config);
        for i in 0..5 {
            session.apply(event(&format!("u{i}"), EventPayload::UserJoined));
        }
        let history = session.history();
        assert_eq!(history.len(), 3);
        let ids: Vec<_> = history.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u2", "u3", "u4"]);
        let recent: Vec<_> = history.recent(2).iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(recent, vec!["u3", "u4"]);
    }

    #[test]
    fn test_zero_capacity_log_keeps_nothing() {
        let mut log = EventLog::new(0);
        log.push(event("a", EventPayload::UserJoined));
        assert!(log.is_empty());
        assert_eq!(log.capacity(), 0);
    }

    #[test]
    fn test_cursor_throttling() {
        let config = SessionConfig {
            cursor_interval: Duration::from_secs(60),
            ..SessionConfig::default()
        };
        let mut session = CollaborationSession::with_config("me", config);
        assert!(session.cursor_moved(1.0, 1.0).is_some());
        assert!(session.cursor_moved(2.0, 2.0).is_none());

        let forced = session.force_cursor();
        let event = forced.to_event().unwrap();
        assert_eq!(event.payload, EventPayload::CursorMove(CursorPosition { x: 2.0, y: 2.0 }));
    }

    #[test]
    fn test_apply_envelope() {
        let mut session = CollaborationSession::new("me");
        let envelope = Envelope::decode(
            r#"{"type":"user_joined","user_id":"frank","timestamp":"2025-05-05T10:00:00"}"#,
        )
        .unwrap();
        assert!(session.apply_envelope(&envelope).unwrap());
        assert_eq!(
            session.participant("frank").unwrap().joined_at.to_rfc3339(),
            "2025-05-05T10:00:00+00:00"
        );

        let error = Envelope::decode(r#"{"type":"error","message":"bad"}"#).unwrap();
        assert!(matches!(
            session.apply_envelope(&error),
            Err(ProtocolError::UnknownType(_))
        ));
    }

    #[test]
    fn test_prune_idle() {
        let config = SessionConfig { idle_timeout: Duration::ZERO, ..SessionConfig::default() };
        let mut session = CollaborationSession::with_config("me", config);
        session.apply(event("gina", EventPayload::UserJoined));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(session.prune_idle(), vec!["gina".to_string()]);
        assert_eq!(session.participant_count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut session = CollaborationSession::new("me");
        session.apply(event("hal", EventPayload::UserJoined));
        session.annotate(annotation("comment"));
        session.clear();
        assert_eq!(session.participant_count(), 0);
        assert!(session.annotations().is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_join_and_leave_messages() {
        let session = CollaborationSession::new("me");
        assert_eq!(session.join_message().kind, "user_joined");
        assert_eq!(session.leave_message().kind, "user_left");
        let selection = session.selection_changed(1, 3, Some("ab".into()));
        assert_eq!(selection.extra["start"], 1);
        assert_eq!(selection.extra["text"], "ab");
    }
}
