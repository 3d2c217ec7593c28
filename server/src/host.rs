//! Room host: runs one room as a single-instance actor.
//!
//! Each room is a tokio task draining a command queue, so connection events
//! for a room are handled one at a time and the controller needs no locks.
//! After a period of inactivity the host drops its controller
//! ("hibernates"); connections and their attachments stay in the registry
//! and the controller is rebuilt on the next event.

use crate::controller::RoomController;
use crate::error::RoomError;
use crate::registry::{ChannelRegistry, ConnectionRegistry, Frame};
use crate::room::RoomMode;
use room_relay_protocol::{ConnectionId, RoomCode, CLOSE_NORMAL, HOST_CLOSE_REASON};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};

/// Per-room runtime settings.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub mode: RoomMode,
    /// Idle time before the controller is dropped.
    pub hibernate_after: Duration,
    /// Idle time before an empty room is removed.
    pub empty_timeout: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            mode: RoomMode::Game,
            hibernate_after: Duration::from_secs(60),
            empty_timeout: Duration::from_secs(300),
        }
    }
}

/// Events delivered to a room, in arrival order.
#[derive(Debug)]
pub enum RoomCommand {
    Connect {
        connection: ConnectionId,
        outbound: mpsc::UnboundedSender<Frame>,
    },
    Message {
        connection: ConnectionId,
        text: String,
    },
    Close {
        connection: ConnectionId,
        code: u16,
        reason: String,
        was_clean: bool,
    },
}

/// State shared between the room task and its handles.
struct RoomShared {
    connections: AtomicUsize,
    hibernating: AtomicBool,
    last_activity: RwLock<Instant>,
}

/// Cloneable handle for submitting events to a running room.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    commands: mpsc::UnboundedSender<RoomCommand>,
    shared: Arc<RoomShared>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Hand a newly accepted connection to the room. Frames for it arrive
    /// on the receiving half of `outbound`.
    pub fn connect(
        &self,
        connection: ConnectionId,
        outbound: mpsc::UnboundedSender<Frame>,
    ) -> Result<(), RoomError> {
        self.submit(RoomCommand::Connect {
            connection,
            outbound,
        })?;
        // Counted now so the lifecycle check never sees a room with a
        // connection in flight as empty.
        self.shared.connections.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn message(&self, connection: ConnectionId, text: String) -> Result<(), RoomError> {
        self.submit(RoomCommand::Message { connection, text })
    }

    pub fn close(
        &self,
        connection: ConnectionId,
        code: u16,
        reason: String,
        was_clean: bool,
    ) -> Result<(), RoomError> {
        self.submit(RoomCommand::Close {
            connection,
            code,
            reason,
            was_clean,
        })
    }

    /// Open connections, as of the last processed event.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::Relaxed)
    }

    pub fn is_hibernating(&self) -> bool {
        self.shared.hibernating.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub async fn idle_for(&self) -> Duration {
        self.shared.last_activity.read().await.elapsed()
    }

    fn submit(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.commands
            .send(command)
            .map_err(|_| RoomError::RoomGone(self.code.clone()))
    }
}

/// Start a room task and return its handle.
///
/// The task runs until every handle is dropped.
pub fn spawn_room(code: RoomCode, settings: &RoomSettings) -> RoomHandle {
    let (commands, command_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(RoomShared {
        connections: AtomicUsize::new(0),
        hibernating: AtomicBool::new(false),
        last_activity: RwLock::new(Instant::now()),
    });

    let host = RoomHost {
        controller: Some(RoomController::new(code.clone(), settings.mode)),
        code: code.clone(),
        mode: settings.mode,
        hibernate_after: settings.hibernate_after,
        registry: ChannelRegistry::new(),
        shared: Arc::clone(&shared),
    };
    tokio::spawn(host.run(command_rx));

    RoomHandle {
        code,
        commands,
        shared,
    }
}

struct RoomHost {
    code: RoomCode,
    mode: RoomMode,
    hibernate_after: Duration,
    registry: ChannelRegistry,
    /// `None` while hibernating.
    controller: Option<RoomController>,
    shared: Arc<RoomShared>,
}

impl RoomHost {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<RoomCommand>) {
        tracing::info!("[Room {}] Started in {} mode", self.code, self.mode);

        loop {
            let awake = self.controller.is_some();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = tokio::time::sleep(self.hibernate_after), if awake => self.hibernate(),
            }
        }

        for connection in self.registry.list_active() {
            self.registry.close(connection, CLOSE_NORMAL, HOST_CLOSE_REASON);
        }
        tracing::info!("[Room {}] Stopped", self.code);
    }

    async fn handle(&mut self, command: RoomCommand) {
        if self.controller.is_none() {
            tracing::info!("[Room {}] Waking up", self.code);
            self.shared.hibernating.store(false, Ordering::Relaxed);
        }
        let controller = self
            .controller
            .get_or_insert_with(|| RoomController::restore(self.code.clone(), self.mode, &self.registry));

        match command {
            RoomCommand::Connect {
                connection,
                outbound,
            } => {
                self.registry.register(connection, outbound);
                controller.on_connect(connection);
            }
            RoomCommand::Message { connection, text } => {
                if let Err(e) = controller.on_message(&mut self.registry, connection, &text) {
                    tracing::warn!("[Room {}] Message from {} failed: {}", self.code, connection, e);
                }
            }
            RoomCommand::Close {
                connection,
                code,
                reason,
                was_clean,
            } => {
                controller.on_close(&mut self.registry, connection, code, &reason, was_clean);
                self.registry.forget(connection);
            }
        }

        self.shared
            .connections
            .store(self.registry.len(), Ordering::Relaxed);
        *self.shared.last_activity.write().await = Instant::now();
    }

    fn hibernate(&mut self) {
        tracing::info!(
            "[Room {}] Hibernating with {} open connection(s)",
            self.code,
            self.registry.len()
        );
        self.controller = None;
        self.shared.hibernating.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_relay_protocol::{Outbound, Player};

    fn settings(hibernate_after: Duration) -> RoomSettings {
        RoomSettings {
            mode: RoomMode::Game,
            hibernate_after,
            empty_timeout: Duration::from_secs(300),
        }
    }

    async fn next_frame(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Frame {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("connection dropped")
    }

    async fn next_message(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Outbound {
        match next_frame(rx).await {
            Frame::Text(text) => Outbound::decode(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    fn connect(room: &RoomHandle, id: u64) -> (ConnectionId, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        room.connect(ConnectionId(id), tx).unwrap();
        (ConnectionId(id), rx)
    }

    #[tokio::test]
    async fn two_players_join_and_start() {
        let room = spawn_room(RoomCode::new("T1"), &settings(Duration::from_secs(60)));
        let (a, mut a_rx) = connect(&room, 1);
        let (b, mut b_rx) = connect(&room, 2);

        room.message(a, r#"{"type":"join"}"#.into()).unwrap();
        assert!(matches!(
            next_message(&mut a_rx).await,
            Outbound::Join {
                player: Some(Player::X),
                ..
            }
        ));

        room.message(b, r#"{"type":"join"}"#.into()).unwrap();
        assert!(matches!(
            next_message(&mut b_rx).await,
            Outbound::Join {
                player: Some(Player::O),
                ..
            }
        ));
        assert!(matches!(next_message(&mut a_rx).await, Outbound::Start { .. }));
        assert!(matches!(next_message(&mut b_rx).await, Outbound::Start { .. }));
    }

    #[tokio::test]
    async fn client_close_is_answered_with_host_reason() {
        let room = spawn_room(RoomCode::new("T2"), &settings(Duration::from_secs(60)));
        let (a, mut a_rx) = connect(&room, 1);

        room.close(a, 1000, "bye".into(), true).unwrap();

        assert_eq!(
            next_frame(&mut a_rx).await,
            Frame::Close {
                code: 1000,
                reason: HOST_CLOSE_REASON.to_string()
            }
        );
    }

    #[tokio::test]
    async fn identity_survives_hibernation() {
        let room = spawn_room(
            RoomCode::new("T3"),
            &settings(Duration::from_millis(20)),
        );
        let (a, mut a_rx) = connect(&room, 1);
        room.message(a, r#"{"type":"join"}"#.into()).unwrap();
        let Outbound::Join { sender_id, .. } = next_message(&mut a_rx).await else {
            panic!("expected join reply");
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(room.is_hibernating());

        room.message(a, r#"{"type":"join"}"#.into()).unwrap();
        let Outbound::Join {
            sender_id: again,
            player,
            ..
        } = next_message(&mut a_rx).await
        else {
            panic!("expected join reply");
        };
        assert_eq!(again, sender_id);
        assert_eq!(player, Some(Player::X));
        assert!(!room.is_hibernating());
    }

    #[tokio::test]
    async fn room_stops_when_handles_drop() {
        let room = spawn_room(RoomCode::new("T4"), &settings(Duration::from_secs(60)));
        let (_a, mut a_rx) = connect(&room, 1);
        drop(room);

        assert_eq!(
            next_frame(&mut a_rx).await,
            Frame::Close {
                code: CLOSE_NORMAL,
                reason: HOST_CLOSE_REASON.to_string()
            }
        );
    }
}
