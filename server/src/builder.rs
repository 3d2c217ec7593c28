use crate::room::RoomMode;
use crate::{Server, ServerConfig, ServerError};

/// Builder for constructing a Server instance.
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Set server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the HTTP address.
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.http_addr = addr.into();
        self
    }

    /// Set how rooms treat traffic. Default: [`RoomMode::Game`].
    pub fn room_mode(mut self, mode: RoomMode) -> Self {
        self.config.room_mode = mode;
        self
    }

    /// Set idle seconds before a room hibernates. Default: 60.
    pub fn hibernate_after_secs(mut self, secs: u64) -> Self {
        self.config.hibernate_after_secs = secs;
        self
    }

    /// Set how long an empty room is kept. Default: 300.
    pub fn empty_room_timeout_secs(mut self, secs: u64) -> Self {
        self.config.empty_room_timeout_secs = secs;
        self
    }

    /// Set seconds between lifecycle checks. Default: 30.
    pub fn lifecycle_interval_secs(mut self, secs: u64) -> Self {
        self.config.lifecycle_interval_secs = secs;
        self
    }

    /// Build the server.
    pub fn build(self) -> Result<Server, ServerError> {
        if self.config.http_addr.is_empty() {
            return Err(ServerError::Config("http_addr is required".into()));
        }
        if self.config.hibernate_after_secs == 0 {
            return Err(ServerError::Config(
                "hibernate_after_secs must be positive".into(),
            ));
        }
        if self.config.lifecycle_interval_secs == 0 {
            return Err(ServerError::Config(
                "lifecycle_interval_secs must be positive".into(),
            ));
        }

        Ok(Server {
            config: self.config,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
