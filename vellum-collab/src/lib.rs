//! # vellum-collab: Real-time collaboration channel for Vellum
//!
//! Connects a document view to a collaboration session over WebSocket and
//! keeps presence state for the other participants.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   JSON text frames   ┌──────────────────┐
//! │ EventChannel │ ◄──────────────────► │ session server   │
//! │ (per view)   │                      │ /collaboration/ws│
//! └──────┬───────┘                      └──────────────────┘
//!        │ Envelope
//!        ▼
//! ┌──────────────────────┐
//! │ CollaborationSession │  participants, annotations, history
//! └──────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: JSON envelope, typed events, session addresses
//! - [`channel`]: Reconnecting event channel and its state machine
//! - [`presence`]: Remote cursors, selections and annotations

pub mod channel;
pub mod presence;
pub mod protocol;

// Re-exports for convenience
pub use channel::{
    Action, ChannelConfig, ChannelError, ChannelEvent, ChannelHandler, ChannelState,
    ChannelStats, EventChannel, Input, MessageFn, ReconnectMachine, ReconnectPolicy,
};
pub use presence::{
    AnnotationRecord, CollaborationSession, EventLog, Participant, SessionConfig,
};
pub use protocol::{
    anonymous_user_id, parse_timestamp, session_url, Annotation, CollaborationEvent,
    CursorPosition, Envelope, EventPayload, EventType, ProtocolError, SelectionRange,
};
