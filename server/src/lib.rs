//! Two-player WebSocket room relay.
//!
//! Rooms are addressed by a room code and each runs as a single-instance
//! actor (see [`host`]). The room logic itself ([`controller`], [`router`],
//! [`room`]) only talks to connections through [`registry::ConnectionRegistry`],
//! so it can be driven without any transport.

pub mod builder;
pub mod controller;
pub mod error;
pub mod host;
pub mod manager;
pub mod registry;
pub mod rest;
pub mod room;
pub mod router;
pub mod sink;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod ws;

use crate::host::RoomSettings;
use crate::manager::RoomManager;
use crate::rest::AppState;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use builder::ServerBuilder;
pub use controller::RoomController;
pub use error::{RoomError, ServerError};
pub use registry::{Attachment, ConnectionRegistry, Frame};
pub use room::{Room, RoomMode, Session};
pub use router::MessageRouter;

/// Configuration for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server.
    pub http_addr: String,
    /// Behaviour of every room.
    pub room_mode: RoomMode,
    /// Idle seconds before a room drops its in-memory state.
    pub hibernate_after_secs: u64,
    /// Seconds an empty room is kept before removal.
    pub empty_room_timeout_secs: u64,
    /// Seconds between room lifecycle checks.
    pub lifecycle_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8787".to_string(),
            room_mode: RoomMode::Game,
            hibernate_after_secs: 60,
            empty_room_timeout_secs: 300, // 5 minutes
            lifecycle_interval_secs: 30,
        }
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T, ServerError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| ServerError::Config(format!("{name}: {e}"))),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(ServerError::Config(format!("{name}: {e}"))),
    }
}

impl ServerConfig {
    /// Defaults overridden by `RELAY_HTTP_ADDR`, `RELAY_ROOM_MODE`,
    /// `RELAY_HIBERNATE_AFTER_SECS`, `RELAY_EMPTY_ROOM_TIMEOUT_SECS` and
    /// `RELAY_LIFECYCLE_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self, ServerError> {
        let defaults = Self::default();
        Ok(Self {
            http_addr: env_or("RELAY_HTTP_ADDR", defaults.http_addr)?,
            room_mode: env_or("RELAY_ROOM_MODE", defaults.room_mode)?,
            hibernate_after_secs: env_or("RELAY_HIBERNATE_AFTER_SECS", defaults.hibernate_after_secs)?,
            empty_room_timeout_secs: env_or(
                "RELAY_EMPTY_ROOM_TIMEOUT_SECS",
                defaults.empty_room_timeout_secs,
            )?,
            lifecycle_interval_secs: env_or(
                "RELAY_LIFECYCLE_INTERVAL_SECS",
                defaults.lifecycle_interval_secs,
            )?,
        })
    }

    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            mode: self.room_mode,
            hibernate_after: Duration::from_secs(self.hibernate_after_secs),
            empty_timeout: Duration::from_secs(self.empty_room_timeout_secs),
        }
    }
}

/// The relay server.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until the HTTP server exits.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(
            "Server starting on HTTP {} ({} rooms)",
            self.config.http_addr,
            self.config.room_mode
        );

        let manager = Arc::new(RoomManager::new(self.config.room_settings()));

        // Spawn room lifecycle manager
        let lifecycle_manager = Arc::clone(&manager);
        let interval = Duration::from_secs(self.config.lifecycle_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                lifecycle_manager.run_lifecycle_checks().await;
            }
        });

        let app_state = web::Data::new(AppState {
            manager: Arc::clone(&manager),
        });

        HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(app_state.clone())
                .configure(rest::configure)
        })
        .bind(&self.config.http_addr)?
        .run()
        .await
        .map_err(|e| ServerError::Http(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_settings_follow_config() {
        let config = ServerConfig {
            room_mode: RoomMode::Echo,
            hibernate_after_secs: 5,
            empty_room_timeout_secs: 7,
            ..ServerConfig::default()
        };
        let settings = config.room_settings();
        assert_eq!(settings.mode, RoomMode::Echo);
        assert_eq!(settings.hibernate_after, Duration::from_secs(5));
        assert_eq!(settings.empty_timeout, Duration::from_secs(7));
    }

    #[test]
    fn env_or_uses_default_when_unset() {
        let value: u64 = env_or("RELAY_TEST_SURELY_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
