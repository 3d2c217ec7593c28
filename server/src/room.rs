//! Room membership: the ordered set of sessions tracked by one room.

use crate::registry::Attachment;
use room_relay_protocol::{ConnectionId, Player, SessionId, ROOM_CAPACITY};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How a room treats inbound traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoomMode {
    /// Two seats, typed messages, `move`/`restart` relay.
    #[default]
    Game,
    /// No seats and no capacity: every frame is broadcast to everyone.
    Echo,
}

impl RoomMode {
    /// Maximum number of member connections, if bounded.
    pub fn capacity(self) -> Option<usize> {
        match self {
            RoomMode::Game => Some(ROOM_CAPACITY),
            RoomMode::Echo => None,
        }
    }
}

impl FromStr for RoomMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "game" => Ok(RoomMode::Game),
            "echo" => Ok(RoomMode::Echo),
            other => Err(format!("unknown room mode '{other}' (expected 'game' or 'echo')")),
        }
    }
}

impl fmt::Display for RoomMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomMode::Game => f.write_str("game"),
            RoomMode::Echo => f.write_str("echo"),
        }
    }
}

/// One connected participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub connection: ConnectionId,
    /// Admission order within the room.
    pub admitted: u64,
    /// Assigned on first `join`.
    pub id: Option<SessionId>,
    pub player: Option<Player>,
    /// Position in the join sequence; set together with `player`.
    pub join_seq: Option<u64>,
}

impl Session {
    /// Attachment to persist for this session, once it has an id.
    pub fn attachment(&self) -> Option<Attachment> {
        self.id.clone().map(|id| Attachment {
            id,
            player: self.player,
            join_seq: self.join_seq,
        })
    }
}

/// Result of seating a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    pub player: Player,
    /// False when the session already held this seat.
    pub newly_seated: bool,
}

/// Sessions of one room, keyed by connection.
#[derive(Debug)]
pub struct Room {
    capacity: Option<usize>,
    sessions: BTreeMap<ConnectionId, Session>,
    next_admission: u64,
    next_join_seq: u64,
}

impl Room {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            sessions: BTreeMap::new(),
            next_admission: 0,
            next_join_seq: 0,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Register a connection with an empty identity. Re-admitting a tracked
    /// connection returns the existing session untouched.
    pub fn admit(&mut self, connection: ConnectionId) -> &Session {
        self.entry(connection)
    }

    /// Admit a connection that survived hibernation, applying its attachment.
    pub fn restore(&mut self, connection: ConnectionId, attachment: Option<Attachment>) -> &Session {
        if let Some(seq) = attachment.as_ref().and_then(|a| a.join_seq) {
            self.next_join_seq = self.next_join_seq.max(seq + 1);
        }
        let session = self.entry(connection);
        if let Some(attachment) = attachment {
            session.id = Some(attachment.id);
            session.player = attachment.player;
            session.join_seq = attachment.join_seq;
        }
        session
    }

    fn entry(&mut self, connection: ConnectionId) -> &mut Session {
        let next_admission = &mut self.next_admission;
        self.sessions.entry(connection).or_insert_with(|| {
            let admitted = *next_admission;
            *next_admission += 1;
            Session {
                connection,
                admitted,
                id: None,
                player: None,
                join_seq: None,
            }
        })
    }

    pub fn remove(&mut self, connection: ConnectionId) -> Option<Session> {
        self.sessions.remove(&connection)
    }

    pub fn get(&self, connection: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection)
    }

    pub fn get_mut(&mut self, connection: ConnectionId) -> Option<&mut Session> {
        self.sessions.get_mut(&connection)
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.sessions.contains_key(&connection)
    }

    /// Number of tracked sessions, overflow connections included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Whether a connection was admitted after the room was already at
    /// capacity. Overflow connections never become members.
    pub fn is_overflow(&self, connection: ConnectionId) -> bool {
        let (Some(capacity), Some(session)) = (self.capacity, self.sessions.get(&connection)) else {
            return false;
        };
        let ahead = self
            .sessions
            .values()
            .filter(|other| other.admitted < session.admitted)
            .count();
        ahead >= capacity
    }

    /// Connections that receive broadcasts.
    pub fn members(&self) -> Vec<ConnectionId> {
        self.sessions
            .keys()
            .copied()
            .filter(|connection| !self.is_overflow(*connection))
            .collect()
    }

    /// Number of sessions holding a player role.
    pub fn seated(&self) -> usize {
        self.sessions.values().filter(|s| s.player.is_some()).count()
    }

    /// True once every seat is taken.
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|capacity| self.seated() >= capacity)
    }

    /// Give a session the first free role, in join order.
    ///
    /// Returns `None` if the connection is unknown or no role is free.
    pub fn seat(&mut self, connection: ConnectionId) -> Option<Seat> {
        let session = self.sessions.get(&connection)?;
        if let Some(player) = session.player {
            return Some(Seat {
                player,
                newly_seated: false,
            });
        }

        let player = Player::ALL
            .into_iter()
            .find(|role| self.sessions.values().all(|s| s.player != Some(*role)))?;
        let join_seq = self.next_join_seq;
        self.next_join_seq += 1;

        let session = self.sessions.get_mut(&connection)?;
        session.player = Some(player);
        session.join_seq = Some(join_seq);
        Some(Seat {
            player,
            newly_seated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_room() -> Room {
        Room::new(RoomMode::Game.capacity())
    }

    #[test]
    fn admit_is_idempotent() {
        let mut room = game_room();
        room.admit(ConnectionId(1));
        room.admit(ConnectionId(1));
        assert_eq!(room.len(), 1);
        assert_eq!(room.get(ConnectionId(1)).unwrap().admitted, 0);
    }

    #[test]
    fn third_admission_is_overflow() {
        let mut room = game_room();
        for id in 1..=3 {
            room.admit(ConnectionId(id));
        }
        assert!(!room.is_overflow(ConnectionId(1)));
        assert!(!room.is_overflow(ConnectionId(2)));
        assert!(room.is_overflow(ConnectionId(3)));
        assert_eq!(room.members(), vec![ConnectionId(1), ConnectionId(2)]);
    }

    #[test]
    fn echo_rooms_have_no_overflow() {
        let mut room = Room::new(RoomMode::Echo.capacity());
        for id in 1..=5 {
            room.admit(ConnectionId(id));
        }
        assert!(!room.is_overflow(ConnectionId(5)));
        assert_eq!(room.members().len(), 5);
    }

    #[test]
    fn seats_follow_join_order_not_admission_order() {
        let mut room = game_room();
        room.admit(ConnectionId(1));
        room.admit(ConnectionId(2));

        let second_first = room.seat(ConnectionId(2)).unwrap();
        let first_second = room.seat(ConnectionId(1)).unwrap();

        assert_eq!(second_first.player, Player::X);
        assert_eq!(first_second.player, Player::O);
        assert_eq!(room.get(ConnectionId(2)).unwrap().join_seq, Some(0));
        assert_eq!(room.get(ConnectionId(1)).unwrap().join_seq, Some(1));
        assert!(room.is_full());
    }

    #[test]
    fn reseating_keeps_role() {
        let mut room = game_room();
        room.admit(ConnectionId(1));
        room.seat(ConnectionId(1));
        let again = room.seat(ConnectionId(1)).unwrap();
        assert_eq!(again.player, Player::X);
        assert!(!again.newly_seated);
    }

    #[test]
    fn freed_role_goes_to_next_joiner() {
        let mut room = game_room();
        room.admit(ConnectionId(1));
        room.admit(ConnectionId(2));
        room.seat(ConnectionId(1));
        room.seat(ConnectionId(2));

        room.remove(ConnectionId(1));
        room.admit(ConnectionId(3));
        assert!(!room.is_overflow(ConnectionId(3)));

        let seat = room.seat(ConnectionId(3)).unwrap();
        assert_eq!(seat.player, Player::X);
        assert_eq!(room.get(ConnectionId(3)).unwrap().join_seq, Some(2));
    }

    #[test]
    fn restore_applies_attachment_and_advances_join_sequence() {
        let mut room = game_room();
        room.restore(
            ConnectionId(4),
            Some(Attachment {
                id: SessionId("abc".into()),
                player: Some(Player::O),
                join_seq: Some(5),
            }),
        );
        room.restore(ConnectionId(9), None);

        let restored = room.get(ConnectionId(4)).unwrap();
        assert_eq!(restored.id, Some(SessionId("abc".into())));
        assert_eq!(restored.player, Some(Player::O));

        let seat = room.seat(ConnectionId(9)).unwrap();
        assert_eq!(seat.player, Player::X);
        assert_eq!(room.get(ConnectionId(9)).unwrap().join_seq, Some(6));
    }

    #[test]
    fn room_mode_parses_case_insensitively() {
        assert_eq!("ECHO".parse::<RoomMode>().unwrap(), RoomMode::Echo);
        assert_eq!("game".parse::<RoomMode>().unwrap(), RoomMode::Game);
        assert!("chess".parse::<RoomMode>().is_err());
    }
}
