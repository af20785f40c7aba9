//! Game server registration and heartbeat queries.

use super::db::{DatabaseError, StateDatabase};
use super::models::GameServer;

/// Parameters for registering a game server.
pub struct GameServerParams<'a> {
    pub server_id: &'a str,
    pub game_name: &'a str,
    pub host_profile_id: i64,
    pub ip_address: &'a str,
    pub port: u16,
    pub max_players: i64,
    pub current_players: i64,
    pub game_data: &'a str,
}

impl StateDatabase {
    // =========================================================================
    // Game server queries
    // =========================================================================

    /// Register a server or replace an existing registration. Either way the
    /// heartbeat clock restarts at `now`; `registered_at` is kept on update.
    pub async fn upsert_game_server(
        &self,
        params: &GameServerParams<'_>,
        now: i64,
    ) -> Result<GameServer, DatabaseError> {
        sqlx::query(
            "INSERT INTO game_servers (server_id, game_name, host_profile_id, ip_address, port, \
             max_players, current_players, game_data, registered_at, last_heartbeat) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(server_id) DO UPDATE SET game_name = excluded.game_name, \
             host_profile_id = excluded.host_profile_id, ip_address = excluded.ip_address, \
             port = excluded.port, max_players = excluded.max_players, \
             current_players = excluded.current_players, game_data = excluded.game_data, \
             last_heartbeat = excluded.last_heartbeat",
        )
        .bind(params.server_id)
        .bind(params.game_name)
        .bind(params.host_profile_id)
        .bind(params.ip_address)
        .bind(params.port)
        .bind(params.max_players)
        .bind(params.current_players)
        .bind(params.game_data)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_game_server(params.server_id).await
    }

    /// Get a game server by ID.
    pub async fn get_game_server(&self, server_id: &str) -> Result<GameServer, DatabaseError> {
        sqlx::query_as::<_, GameServer>("SELECT * FROM game_servers WHERE server_id = ?")
            .bind(server_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Game server {server_id}")))
    }

    /// Refresh `last_heartbeat`, optionally updating the player count.
    /// Returns `false` if the server is not registered.
    pub async fn touch_game_server(
        &self,
        server_id: &str,
        current_players: Option<i64>,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE game_servers SET last_heartbeat = ?, \
             current_players = COALESCE(?, current_players) WHERE server_id = ?",
        )
        .bind(now)
        .bind(current_players)
        .bind(server_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Servers with a heartbeat after `cutoff`, optionally for one game,
    /// most recent heartbeat first.
    pub async fn list_game_servers_since(
        &self,
        cutoff: i64,
        game_name: Option<&str>,
    ) -> Result<Vec<GameServer>, DatabaseError> {
        let servers = if let Some(game) = game_name {
            sqlx::query_as::<_, GameServer>(
                "SELECT * FROM game_servers WHERE last_heartbeat > ? AND game_name = ? \
                 ORDER BY last_heartbeat DESC",
            )
            .bind(cutoff)
            .bind(game)
            .fetch_all(self.pool())
            .await?
        } else {
            sqlx::query_as::<_, GameServer>(
                "SELECT * FROM game_servers WHERE last_heartbeat > ? ORDER BY last_heartbeat DESC",
            )
            .bind(cutoff)
            .fetch_all(self.pool())
            .await?
        };

        Ok(servers)
    }

    /// Count servers with a heartbeat after `cutoff`.
    pub async fn count_game_servers_since(&self, cutoff: i64) -> Result<i64, DatabaseError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM game_servers WHERE last_heartbeat > ?")
                .bind(cutoff)
                .fetch_one(self.pool())
                .await?;

        Ok(row.0)
    }

    /// Remove a game server.
    pub async fn delete_game_server(&self, server_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM game_servers WHERE server_id = ?")
            .bind(server_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove servers whose last heartbeat is at or before `cutoff`.
    pub async fn delete_game_servers_before(&self, cutoff: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM game_servers WHERE last_heartbeat <= ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
