use room_relay_protocol::{ConnectionId, ProtocolError, RoomCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures while handling a single room event.
///
/// None of these are fatal to the room: the host logs them and moves on
/// to the next event.
#[derive(Error, Debug)]
pub enum RoomError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{0} is not connected to this room")]
    UnknownConnection(ConnectionId),

    #[error("{0} is already closed")]
    ConnectionGone(ConnectionId),

    #[error("room {0} is no longer running")]
    RoomGone(RoomCode),
}
