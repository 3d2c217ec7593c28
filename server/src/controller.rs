//! Room controller: connection admission, capacity enforcement and
//! identity assignment for one room.
//!
//! The controller owns the [`Room`] but not the connections. Every operation
//! takes the [`ConnectionRegistry`] it should act through, so the same
//! controller logic runs against the live host and the in-memory test
//! registry alike.

use crate::error::RoomError;
use crate::registry::ConnectionRegistry;
use crate::room::{Room, RoomMode, Session};
use crate::router::MessageRouter;
use crate::sink::{Destination, RoomSink};
use room_relay_protocol::{
    ConnectionId, Inbound, Outbound, ProtocolError, RoomCode, SessionId, CLOSE_NORMAL,
    HOST_CLOSE_REASON, ROOM_FULL_REASON,
};

/// Close codes a peer may report but an endpoint must never put on the wire.
fn sendable_close_code(code: u16) -> u16 {
    match code {
        1000..=1003 | 1007..=1014 | 3000..=4999 => code,
        _ => CLOSE_NORMAL,
    }
}

pub struct RoomController {
    code: RoomCode,
    mode: RoomMode,
    room: Room,
    sink: RoomSink,
}

impl RoomController {
    pub fn new(code: RoomCode, mode: RoomMode) -> Self {
        Self {
            code,
            mode,
            room: Room::new(mode.capacity()),
            sink: RoomSink::new(),
        }
    }

    /// Rebuild a controller from the connections the host still holds,
    /// applying each one's persisted attachment.
    pub fn restore<R: ConnectionRegistry>(code: RoomCode, mode: RoomMode, registry: &R) -> Self {
        let mut controller = Self::new(code, mode);
        for connection in registry.list_active() {
            controller
                .room
                .restore(connection, registry.attachment(connection));
        }
        tracing::info!(
            "[Room {}] Restored {} connection(s)",
            controller.code,
            controller.room.len()
        );
        controller
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn mode(&self) -> RoomMode {
        self.mode
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Track a connection the host has just accepted.
    pub fn on_connect(&mut self, connection: ConnectionId) -> &Session {
        tracing::debug!("[Room {}] {} connected", self.code, connection);
        self.room.admit(connection)
    }

    /// Handle one inbound text frame.
    pub fn on_message<R: ConnectionRegistry>(
        &mut self,
        registry: &mut R,
        connection: ConnectionId,
        raw: &str,
    ) -> Result<(), RoomError> {
        if !self.room.contains(connection) {
            return Err(RoomError::UnknownConnection(connection));
        }

        if self.mode == RoomMode::Echo {
            return self.echo(registry, raw);
        }

        if self.room.is_overflow(connection) {
            self.reject(registry, connection)?;
            return Ok(());
        }

        let message = Inbound::decode(raw)?;
        tracing::debug!(
            "[Room {}] {} sent '{}'",
            self.code,
            connection,
            message.kind()
        );

        self.ensure_identity(registry, connection);
        let is_join = matches!(message, Inbound::Join {});
        MessageRouter::route(&mut self.room, connection, message, &mut self.sink)?;
        if is_join {
            self.persist(registry, connection);
        }
        self.deliver(registry);
        Ok(())
    }

    /// Answer a client close. The reply always carries the host's reason,
    /// whatever the client said. The session's seat is released.
    pub fn on_close<R: ConnectionRegistry>(
        &mut self,
        registry: &mut R,
        connection: ConnectionId,
        code: u16,
        reason: &str,
        was_clean: bool,
    ) {
        tracing::debug!(
            "[Room {}] {} closed (code {}, reason {:?}, clean {})",
            self.code,
            connection,
            code,
            reason,
            was_clean
        );
        registry.close(connection, sendable_close_code(code), HOST_CLOSE_REASON);

        if let Some(session) = self.room.remove(connection) {
            match session.player {
                Some(player) => tracing::info!(
                    "[Room {}] Player {} left, seat is free",
                    self.code,
                    player
                ),
                None => tracing::debug!("[Room {}] {} left", self.code, connection),
            }
        }
    }

    fn echo<R: ConnectionRegistry>(&mut self, registry: &mut R, raw: &str) -> Result<(), RoomError> {
        let text = serde_json::to_string(raw).map_err(ProtocolError::Encode)?;
        for member in self.room.members() {
            if let Err(e) = registry.send(member, text.clone()) {
                tracing::debug!("[Room {}] Echo dropped: {}", self.code, e);
            }
        }
        Ok(())
    }

    fn reject<R: ConnectionRegistry>(
        &mut self,
        registry: &mut R,
        connection: ConnectionId,
    ) -> Result<(), RoomError> {
        tracing::info!("[Room {}] Rejecting {}: room is full", self.code, connection);
        let notice = Outbound::room_full().encode()?;
        if let Err(e) = registry.send(connection, notice) {
            tracing::debug!("[Room {}] Full notice dropped: {}", self.code, e);
        }
        registry.close(connection, CLOSE_NORMAL, ROOM_FULL_REASON);
        self.room.remove(connection);
        Ok(())
    }

    fn ensure_identity<R: ConnectionRegistry>(&mut self, registry: &mut R, connection: ConnectionId) {
        let Some(session) = self.room.get_mut(connection) else {
            return;
        };
        if session.id.is_some() {
            return;
        }
        let id = SessionId::generate();
        tracing::info!("[Room {}] {} is session {}", self.code, connection, id);
        session.id = Some(id);
        self.persist(registry, connection);
    }

    fn persist<R: ConnectionRegistry>(&self, registry: &mut R, connection: ConnectionId) {
        if let Some(attachment) = self.room.get(connection).and_then(Session::attachment) {
            registry.set_attachment(connection, attachment);
        }
    }

    fn deliver<R: ConnectionRegistry>(&mut self, registry: &mut R) {
        for output in self.sink.drain() {
            let text = match output.message.encode() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("[Room {}] Dropping outbound message: {}", self.code, e);
                    continue;
                }
            };
            let targets = match output.to {
                Destination::Connection(connection) => vec![connection],
                Destination::Broadcast => self.room.members(),
            };
            for target in targets {
                if let Err(e) = registry.send(target, text.clone()) {
                    tracing::debug!("[Room {}] Send dropped: {}", self.code, e);
                }
            }
        }
    }
}
