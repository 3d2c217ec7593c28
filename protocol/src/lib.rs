//! Wire protocol for room relay connections.
//!
//! Every frame is a UTF-8 JSON text frame carrying a `type` tag plus
//! kind-specific fields. Client and server share the same envelope shape,
//! but the set of kinds differs per direction: see [`Inbound`] and
//! [`Outbound`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Maximum number of seated participants in a game room.
pub const ROOM_CAPACITY: usize = 2;

/// WebSocket close code used for every server-initiated close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close reason (and `full` message text) sent to a rejected connection.
pub const ROOM_FULL_REASON: &str = "Room is full";

/// Close reason used whenever the room answers a client close.
pub const HOST_CLOSE_REASON: &str = "Durable Object is closing WebSocket";

/// Opaque per-connection handle assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Stable random identifier of a participant, assigned on first join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Code that addresses a room. Any string is valid, including the empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Player role in a game room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    X,
    O,
}

impl Player {
    /// Roles in seating order.
    pub const ALL: [Player; ROOM_CAPACITY] = [Player::X, Player::O];
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::X => f.write_str("X"),
            Player::O => f.write_str("O"),
        }
    }
}

/// Free-form fields carried by relayed messages, minus the `type` tag.
pub type Payload = Map<String, Value>;

/// Messages a client may send.
///
/// Anything with an unrecognised `type` decodes to [`Inbound::Unknown`]
/// instead of failing, so only malformed JSON is a decode error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    /// Ask for a seat (and an id, if the connection has none yet).
    Join {},
    /// Echoed straight back to the sender.
    Full {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Game move, relayed untouched to the whole room.
    Move {
        #[serde(flatten)]
        payload: Payload,
    },
    /// Restart request, relayed untouched to the whole room.
    Restart {
        #[serde(flatten)]
        payload: Payload,
    },
    #[serde(other)]
    Unknown,
}

impl Inbound {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Short tag name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::Join {} => "join",
            Inbound::Full { .. } => "full",
            Inbound::Move { .. } => "move",
            Inbound::Restart { .. } => "restart",
            Inbound::Unknown => "unknown",
        }
    }
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    /// Reply to a `join`, sent to the joining connection only.
    Join {
        message: String,
        #[serde(rename = "senderId")]
        sender_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<Player>,
    },
    /// Capacity rejection notice.
    Full { message: String },
    /// Broadcast once both seats are taken.
    Start { message: String },
    Move {
        #[serde(flatten)]
        payload: Payload,
    },
    Restart {
        #[serde(flatten)]
        payload: Payload,
    },
}

impl Outbound {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    /// The `full` notice sent before closing a rejected connection.
    pub fn room_full() -> Self {
        Outbound::Full {
            message: ROOM_FULL_REASON.to_string(),
        }
    }
}

/// Body of `POST /api`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRoomRequest {
    #[serde(rename = "roomCode")]
    pub room_code: RoomCode,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Decode(serde_json::Error),
    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),
}
