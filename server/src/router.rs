//! Message routing for game rooms.
//!
//! Routing is pure: it reads and updates the [`Room`] passed in and records
//! outputs in a [`RoomSink`]. Delivery is the controller's job.

use crate::error::RoomError;
use crate::room::Room;
use crate::sink::RoomSink;
use room_relay_protocol::{ConnectionId, Inbound, Outbound, Player, ROOM_FULL_REASON};

/// Text of the `start` broadcast.
pub const START_MESSAGE: &str = "Both players have joined, the game begins";

fn join_message(player: Option<Player>) -> String {
    match player {
        Some(player) => format!("Joined as player {player}"),
        None => "Joined room".to_string(),
    }
}

/// Decides who receives what for each inbound message kind.
pub struct MessageRouter;

impl MessageRouter {
    /// Route one message from `sender`.
    ///
    /// The sender must already be tracked by `room` and, for `join`, must
    /// already have a session id.
    pub fn route(
        room: &mut Room,
        sender: ConnectionId,
        message: Inbound,
        sink: &mut RoomSink,
    ) -> Result<(), RoomError> {
        match message {
            Inbound::Join {} => Self::join(room, sender, sink),
            Inbound::Full { message } => {
                let message = message.unwrap_or_else(|| ROOM_FULL_REASON.to_string());
                sink.reply(sender, Outbound::Full { message });
                Ok(())
            }
            Inbound::Move { payload } => {
                sink.broadcast(Outbound::Move { payload });
                Ok(())
            }
            Inbound::Restart { payload } => {
                sink.broadcast(Outbound::Restart { payload });
                Ok(())
            }
            Inbound::Unknown => {
                tracing::debug!("{} sent a message of unknown type, ignoring", sender);
                Ok(())
            }
        }
    }

    fn join(room: &mut Room, sender: ConnectionId, sink: &mut RoomSink) -> Result<(), RoomError> {
        let seat = room.seat(sender);
        let session = room
            .get(sender)
            .ok_or(RoomError::UnknownConnection(sender))?;
        let sender_id = session
            .id
            .clone()
            .ok_or(RoomError::UnknownConnection(sender))?;
        let player = seat.map(|seat| seat.player);

        sink.reply(
            sender,
            Outbound::Join {
                message: join_message(player),
                sender_id: sender_id.clone(),
                player,
            },
        );

        if seat.is_some_and(|seat| seat.newly_seated) && room.is_full() {
            tracing::info!("{} took the last seat, starting game", sender_id);
            sink.broadcast(Outbound::Start {
                message: START_MESSAGE.to_string(),
            });
        }
        Ok(())
    }
}
