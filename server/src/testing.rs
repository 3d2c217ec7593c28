//! In-memory connection registry for driving rooms without a transport.

use crate::error::RoomError;
use crate::registry::{Attachment, ConnectionRegistry};
use room_relay_protocol::{ConnectionId, Outbound};
use std::collections::BTreeMap;

/// Everything the room did to one connection.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    pub attachment: Option<Attachment>,
    /// Text frames, oldest first.
    pub sent: Vec<String>,
    /// Close code and reason, once closed.
    pub closed: Option<(u16, String)>,
}

/// Registry that records sends and closes instead of performing them.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    connections: BTreeMap<ConnectionId, MemoryConnection>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a connection at the transport level.
    pub fn open(&mut self, connection: ConnectionId) {
        self.connections.entry(connection).or_default();
    }

    /// Simulate the transport vanishing without a close handshake.
    pub fn drop_connection(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
    }

    pub fn connection(&self, connection: ConnectionId) -> Option<&MemoryConnection> {
        self.connections.get(&connection)
    }

    pub fn is_open(&self, connection: ConnectionId) -> bool {
        self.connections
            .get(&connection)
            .is_some_and(|c| c.closed.is_none())
    }

    pub fn closed_with(&self, connection: ConnectionId) -> Option<(u16, String)> {
        self.connections
            .get(&connection)
            .and_then(|c| c.closed.clone())
    }

    /// Take the raw text frames sent so far.
    pub fn take_sent(&mut self, connection: ConnectionId) -> Vec<String> {
        self.connections
            .get_mut(&connection)
            .map(|c| std::mem::take(&mut c.sent))
            .unwrap_or_default()
    }

    /// Take the frames sent so far, decoded. Frames that are not protocol
    /// messages (echo-room traffic) are skipped.
    pub fn take_messages(&mut self, connection: ConnectionId) -> Vec<Outbound> {
        self.take_sent(connection)
            .iter()
            .filter_map(|text| Outbound::decode(text).ok())
            .collect()
    }
}

impl ConnectionRegistry for MemoryRegistry {
    fn list_active(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, c)| c.closed.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    fn attachment(&self, connection: ConnectionId) -> Option<Attachment> {
        self.connections
            .get(&connection)
            .and_then(|c| c.attachment.clone())
    }

    fn set_attachment(&mut self, connection: ConnectionId, attachment: Attachment) {
        if let Some(c) = self.connections.get_mut(&connection) {
            c.attachment = Some(attachment);
        }
    }

    fn send(&mut self, connection: ConnectionId, text: String) -> Result<(), RoomError> {
        match self.connections.get_mut(&connection) {
            Some(c) if c.closed.is_none() => {
                c.sent.push(text);
                Ok(())
            }
            _ => Err(RoomError::ConnectionGone(connection)),
        }
    }

    fn close(&mut self, connection: ConnectionId, code: u16, reason: &str) {
        if let Some(c) = self.connections.get_mut(&connection) {
            if c.closed.is_none() {
                c.closed = Some((code, reason.to_string()));
            }
        }
    }
}
