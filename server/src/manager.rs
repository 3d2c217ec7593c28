//! Room table: resolves room codes to running rooms.

use crate::host::{spawn_room, RoomHandle, RoomSettings};
use dashmap::DashMap;
use room_relay_protocol::{ConnectionId, RoomCode};
use std::sync::atomic::{AtomicU64, Ordering};

/// Manages all active rooms.
pub struct RoomManager {
    rooms: DashMap<RoomCode, RoomHandle>,
    next_connection_id: AtomicU64,
    settings: RoomSettings,
}

impl RoomManager {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            rooms: DashMap::new(),
            next_connection_id: AtomicU64::new(1),
            settings,
        }
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// Get the room for `code`, starting it if it is not running.
    pub fn resolve(&self, code: &RoomCode) -> RoomHandle {
        let mut entry = self.rooms.entry(code.clone()).or_insert_with(|| {
            tracing::info!("Creating room {}", code);
            spawn_room(code.clone(), &self.settings)
        });
        if !entry.is_running() {
            tracing::info!("Restarting room {}", code);
            *entry = spawn_room(code.clone(), &self.settings);
        }
        entry.clone()
    }

    /// Allocate a connection id, unique across all rooms.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn room_exists(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Remove rooms that have been empty for longer than the configured
    /// timeout (call periodically).
    pub async fn run_lifecycle_checks(&self) {
        let handles: Vec<RoomHandle> = self.rooms.iter().map(|entry| entry.value().clone()).collect();
        let mut to_remove = Vec::new();

        for handle in handles {
            if !handle.is_running() {
                to_remove.push(handle.code().clone());
                continue;
            }
            if handle.connection_count() == 0 && handle.idle_for().await > self.settings.empty_timeout {
                to_remove.push(handle.code().clone());
            }
        }

        for code in to_remove {
            let removed = self
                .rooms
                .remove_if(&code, |_, handle| handle.connection_count() == 0 || !handle.is_running());
            if removed.is_some() {
                tracing::info!("Room {} expired and removed", code);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(empty_timeout: Duration) -> RoomSettings {
        RoomSettings {
            empty_timeout,
            ..RoomSettings::default()
        }
    }

    #[tokio::test]
    async fn resolve_reuses_running_room() {
        let manager = RoomManager::new(RoomSettings::default());
        let code = RoomCode::new("ABCD");

        let first = manager.resolve(&code);
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        first.connect(manager.next_connection_id(), tx).unwrap();
        let second = manager.resolve(&code);

        assert_eq!(manager.room_count(), 1);
        assert_eq!(second.connection_count(), 1);
    }

    #[tokio::test]
    async fn connection_ids_are_unique() {
        let manager = RoomManager::new(RoomSettings::default());
        let a = manager.next_connection_id();
        let b = manager.next_connection_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_rooms_expire() {
        let manager = RoomManager::new(settings(Duration::from_millis(10)));
        let code = RoomCode::new("gone");
        manager.resolve(&code);

        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.run_lifecycle_checks().await;

        assert!(!manager.room_exists(&code));
    }

    #[tokio::test]
    async fn occupied_rooms_stay() {
        let manager = RoomManager::new(settings(Duration::from_millis(10)));
        let code = RoomCode::new("busy");
        let room = manager.resolve(&code);
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        room.connect(manager.next_connection_id(), tx).unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.run_lifecycle_checks().await;

        assert!(manager.room_exists(&code));
    }
}
