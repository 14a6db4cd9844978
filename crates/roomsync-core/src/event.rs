//! Live event kinds and the wire envelope.
//!
//! Every pushed event is wrapped as `{type, data, timestamp}`. Streaming
//! transports frame it as `event: <type>\ndata: <json>\n\n`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a pushed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Greeting sent right after a connection registers
    Connected,
    /// A user registered
    UserCreated,
    /// A member left the recipient's room
    UserLeft,
    /// A room was created explicitly
    RoomCreated,
    /// The recipient's room was deleted
    RoomDeleted,
    /// The recipient received an invite
    UserInvited,
    /// A user joined the recipient's room
    UserJoined,
    /// New chat message
    ChatMessage,
    /// Liveness probe
    Heartbeat,
    /// New clipboard share (payload is the operation)
    ClipboardCopied,
    /// A clipboard share changed, e.g. its archive is ready
    ClipboardUpdated,
    /// A user went offline
    UserOffline,
    /// Someone asks the recipient (room owner) to let them in
    JoinRequest,
}

impl EventKind {
    /// Wire name (`chat_message`, `user_joined`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::UserCreated => "user_created",
            Self::UserLeft => "user_left",
            Self::RoomCreated => "room_created",
            Self::RoomDeleted => "room_deleted",
            Self::UserInvited => "user_invited",
            Self::UserJoined => "user_joined",
            Self::ChatMessage => "chat_message",
            Self::Heartbeat => "heartbeat",
            Self::ClipboardCopied => "clipboard_copied",
            Self::ClipboardUpdated => "clipboard_updated",
            Self::UserOffline => "user_offline",
            Self::JoinRequest => "join_request",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event as delivered to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Event payload, opaque to the transport
    pub data: Value,
    /// Unix seconds at send
    pub timestamp: u64,
}

impl Envelope {
    /// Serialize to a wire frame.
    pub fn encode(&self) -> Result<EventFrame, serde_json::Error> {
        Ok(EventFrame { kind: self.kind, json: serde_json::to_string(self)? })
    }
}

/// A serialized envelope ready to be written to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFrame {
    /// Event kind, repeated outside the JSON for streaming framing
    pub kind: EventKind,
    /// JSON encoded [`Envelope`]
    pub json: String,
}

impl EventFrame {
    /// Server-sent-events framing.
    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.kind, self.json)
    }

    /// Decode the envelope back (used by clients and tests).
    pub fn envelope(&self) -> Result<Envelope, serde_json::Error> {
        serde_json::from_str(&self.json)
    }
}
