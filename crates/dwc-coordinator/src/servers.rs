//! Game server registry driven by heartbeats.
//!
//! "Online" is never stored. A server that stops sending heartbeats drops
//! out of `list_active` after two minutes without being deregistered.

use std::sync::Arc;

use dwc_core::liveness::{Clock, LivenessWindow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoordinatorError, Result};
use crate::storage::{GameServer, GameServerParams, StateDatabase};

/// Registration request for a hosted game server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRegistration {
    pub server_id: String,
    pub game_name: String,
    pub host_profile_id: i64,
    pub ip_address: String,
    pub port: u16,
    #[serde(default = "default_max_players")]
    pub max_players: i64,
    #[serde(default)]
    pub current_players: i64,
    /// Opaque game-specific payload.
    #[serde(default)]
    pub game_data: serde_json::Value,
}

const fn default_max_players() -> i64 {
    4
}

#[derive(Clone)]
pub struct GameServerRegistry {
    db: StateDatabase,
    clock: Arc<dyn Clock>,
}

impl GameServerRegistry {
    pub fn new(db: StateDatabase, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Register or re-register a server. The host profile must exist.
    pub async fn register(&self, registration: &ServerRegistration) -> Result<GameServer> {
        self.db.get_profile(registration.host_profile_id).await?;

        let game_data = if registration.game_data.is_null() {
            "{}".to_string()
        } else {
            registration.game_data.to_string()
        };
        let params = GameServerParams {
            server_id: &registration.server_id,
            game_name: &registration.game_name,
            host_profile_id: registration.host_profile_id,
            ip_address: &registration.ip_address,
            port: registration.port,
            max_players: registration.max_players,
            current_players: registration.current_players,
            game_data: &game_data,
        };
        let server = self.db.upsert_game_server(&params, self.clock.now()).await?;

        info!(
            server_id = %server.server_id,
            game = %server.game_name,
            host_profile_id = registration.host_profile_id,
            "Game server registered"
        );
        Ok(server)
    }

    /// Refresh the heartbeat clock. Unknown servers are not re-created.
    pub async fn heartbeat(&self, server_id: &str, current_players: Option<i64>) -> Result<()> {
        let touched = self
            .db
            .touch_game_server(server_id, current_players, self.clock.now())
            .await?;
        if !touched {
            return Err(CoordinatorError::NotFound(format!("Game server {server_id}")));
        }
        debug!(server_id = %server_id, ?current_players, "Heartbeat");
        Ok(())
    }

    /// Servers with a heartbeat inside the timeout, optionally for one game.
    pub async fn list_active(&self, game_name: Option<&str>) -> Result<Vec<GameServer>> {
        let cutoff = LivenessWindow::HEARTBEAT.cutoff(self.clock.now());
        Ok(self.db.list_game_servers_since(cutoff, game_name).await?)
    }

    pub async fn get(&self, server_id: &str) -> Result<GameServer> {
        Ok(self.db.get_game_server(server_id).await?)
    }

    pub fn is_online(&self, server: &GameServer) -> bool {
        server.is_online(self.clock.now())
    }

    pub async fn unregister(&self, server_id: &str) -> Result<bool> {
        let removed = self.db.delete_game_server(server_id).await?;
        if removed {
            info!(server_id = %server_id, "Game server unregistered");
        }
        Ok(removed)
    }

    /// Delete servers silent for `max_age_secs` or longer.
    pub async fn purge_stale(&self, max_age_secs: i64) -> Result<u64> {
        let cutoff = LivenessWindow::from_secs(max_age_secs).cutoff(self.clock.now());
        let purged = self.db.delete_game_servers_before(cutoff).await?;
        if purged > 0 {
            info!(purged, "Purged stale game servers");
        }
        Ok(purged)
    }
}
