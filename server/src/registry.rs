//! Connection registry: the host-side view of a room's open connections.
//!
//! The registry outlives a hibernating [`RoomController`](crate::controller::RoomController):
//! connections and their attachments stay here while the controller is
//! dropped, and the controller is rebuilt from [`ConnectionRegistry::list_active`]
//! on the next event.

use crate::error::RoomError;
use room_relay_protocol::{ConnectionId, Player, SessionId};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Per-connection data persisted across hibernation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: SessionId,
    pub player: Option<Player>,
    pub join_seq: Option<u64>,
}

impl Attachment {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            player: None,
            join_seq: None,
        }
    }
}

/// A frame written to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close { code: u16, reason: String },
}

/// What the room core needs from its host.
pub trait ConnectionRegistry {
    /// Connections that are currently open, in connection order.
    fn list_active(&self) -> Vec<ConnectionId>;

    fn attachment(&self, connection: ConnectionId) -> Option<Attachment>;

    fn set_attachment(&mut self, connection: ConnectionId, attachment: Attachment);

    /// Write a text frame. Fails only if the connection is gone.
    fn send(&mut self, connection: ConnectionId, text: String) -> Result<(), RoomError>;

    /// Send a close frame and forget the connection.
    fn close(&mut self, connection: ConnectionId, code: u16, reason: &str);
}

struct ConnectionEntry {
    outbound: mpsc::UnboundedSender<Frame>,
    attachment: Option<Attachment>,
}

/// Registry backed by one unbounded channel per connection.
///
/// The receiving half belongs to the transport (a WebSocket actor), which
/// writes every [`Frame`] it gets to the socket.
#[derive(Default)]
pub struct ChannelRegistry {
    connections: BTreeMap<ConnectionId, ConnectionEntry>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly accepted connection.
    pub fn register(&mut self, connection: ConnectionId, outbound: mpsc::UnboundedSender<Frame>) {
        self.connections.insert(
            connection,
            ConnectionEntry {
                outbound,
                attachment: None,
            },
        );
    }

    /// Drop a connection without sending anything (transport already gone).
    pub fn forget(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl ConnectionRegistry for ChannelRegistry {
    fn list_active(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, entry)| !entry.outbound.is_closed())
            .map(|(id, _)| *id)
            .collect()
    }

    fn attachment(&self, connection: ConnectionId) -> Option<Attachment> {
        self.connections
            .get(&connection)
            .and_then(|entry| entry.attachment.clone())
    }

    fn set_attachment(&mut self, connection: ConnectionId, attachment: Attachment) {
        if let Some(entry) = self.connections.get_mut(&connection) {
            entry.attachment = Some(attachment);
        }
    }

    fn send(&mut self, connection: ConnectionId, text: String) -> Result<(), RoomError> {
        let entry = self
            .connections
            .get(&connection)
            .ok_or(RoomError::ConnectionGone(connection))?;
        entry
            .outbound
            .send(Frame::Text(text))
            .map_err(|_| RoomError::ConnectionGone(connection))
    }

    fn close(&mut self, connection: ConnectionId, code: u16, reason: &str) {
        if let Some(entry) = self.connections.remove(&connection) {
            let _ = entry.outbound.send(Frame::Close {
                code,
                reason: reason.to_string(),
            });
        }
    }
}
