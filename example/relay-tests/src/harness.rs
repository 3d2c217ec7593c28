//! Test harness for room controllers.
//!
//! Owns a controller and the registry it acts through, and plays the part
//! of the host: accepting connections, forwarding frames and closes, and
//! dropping the controller to simulate hibernation.

use room_relay_protocol::{ConnectionId, Outbound, RoomCode};
use room_relay_server::testing::MemoryRegistry;
use room_relay_server::{RoomController, RoomError, RoomMode};
use serde_json::Value;

pub struct RelayHarness {
    code: RoomCode,
    mode: RoomMode,
    controller: RoomController,
    registry: MemoryRegistry,
    next_connection: u64,
}

impl RelayHarness {
    pub fn new() -> Self {
        Self::with_mode(RoomMode::Game)
    }

    pub fn with_mode(mode: RoomMode) -> Self {
        let code = RoomCode::new("TEST");
        Self {
            controller: RoomController::new(code.clone(), mode),
            code,
            mode,
            registry: MemoryRegistry::new(),
            next_connection: 1,
        }
    }

    /// Accept a new connection.
    pub fn connect(&mut self) -> ConnectionId {
        let connection = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.registry.open(connection);
        self.controller.on_connect(connection);
        connection
    }

    /// Send a JSON message from `connection`.
    pub fn send(&mut self, connection: ConnectionId, message: Value) -> Result<(), RoomError> {
        self.send_raw(connection, &message.to_string())
    }

    pub fn send_raw(&mut self, connection: ConnectionId, text: &str) -> Result<(), RoomError> {
        self.controller
            .on_message(&mut self.registry, connection, text)
    }

    /// Client-initiated close.
    pub fn close(&mut self, connection: ConnectionId, code: u16, reason: &str) {
        self.controller
            .on_close(&mut self.registry, connection, code, reason, true);
    }

    /// Drop the controller and rebuild it from the registry.
    pub fn hibernate(&mut self) {
        self.controller = RoomController::restore(self.code.clone(), self.mode, &self.registry);
    }

    /// Decoded messages received by `connection` since the last call.
    pub fn inbox(&mut self, connection: ConnectionId) -> Vec<Outbound> {
        self.registry.take_messages(connection)
    }

    /// Raw frames received by `connection` since the last call.
    pub fn raw_inbox(&mut self, connection: ConnectionId) -> Vec<String> {
        self.registry.take_sent(connection)
    }

    pub fn closed_with(&self, connection: ConnectionId) -> Option<(u16, String)> {
        self.registry.closed_with(connection)
    }

    pub fn controller(&self) -> &RoomController {
        &self.controller
    }
}
