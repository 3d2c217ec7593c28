//! Output sink for the message router.
//!
//! The router never touches connections directly: it records what should be
//! sent where, and the controller drains the sink after each event and
//! delivers through the registry.

use room_relay_protocol::{ConnectionId, Outbound};

/// Where an outgoing message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// A single connection.
    Connection(ConnectionId),
    /// Every member of the room, sender included.
    Broadcast,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub to: Destination,
    pub message: Outbound,
}

/// Collects router outputs in send order.
#[derive(Debug, Default)]
pub struct RoomSink {
    outputs: Vec<Outgoing>,
}

impl RoomSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, to: Destination, message: Outbound) {
        self.outputs.push(Outgoing { to, message });
    }

    pub fn reply(&mut self, connection: ConnectionId, message: Outbound) {
        self.send(Destination::Connection(connection), message);
    }

    pub fn broadcast(&mut self, message: Outbound) {
        self.send(Destination::Broadcast, message);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Outgoing> + '_ {
        self.outputs.drain(..)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
