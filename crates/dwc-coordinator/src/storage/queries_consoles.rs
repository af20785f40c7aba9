//! Console queries.

use super::db::{DatabaseError, StateDatabase};
use super::models::{Console, Platform};

/// Attributes recorded when a console is first seen.
#[derive(Debug, Clone, Default)]
pub struct ConsoleParams<'a> {
    pub mac_address: &'a str,
    pub user_id: &'a str,
    pub device_name: &'a str,
    pub platform: Platform,
}

impl StateDatabase {
    // =========================================================================
    // Console queries
    // =========================================================================

    /// Insert a console on first contact, or refresh `last_seen` on every
    /// later contact. Other attributes of an existing console are kept.
    ///
    /// The boolean is `true` when this call inserted the row.
    pub async fn upsert_console(
        &self,
        params: &ConsoleParams<'_>,
        now: i64,
    ) -> Result<(Console, bool), DatabaseError> {
        let inserted = sqlx::query(
            "INSERT INTO consoles (mac_address, user_id, device_name, platform, registered_at, last_seen) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(mac_address) DO NOTHING",
        )
        .bind(params.mac_address)
        .bind(params.user_id)
        .bind(params.device_name)
        .bind(params.platform.as_str())
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .rows_affected()
            > 0;

        if !inserted {
            sqlx::query("UPDATE consoles SET last_seen = ? WHERE mac_address = ?")
                .bind(now)
                .bind(params.mac_address)
                .execute(self.pool())
                .await?;
        }

        let console = self.get_console(params.mac_address).await?;
        Ok((console, inserted))
    }

    /// Get a console by MAC address.
    pub async fn get_console(&self, mac_address: &str) -> Result<Console, DatabaseError> {
        sqlx::query_as::<_, Console>("SELECT * FROM consoles WHERE mac_address = ?")
            .bind(mac_address)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Console {mac_address}")))
    }

    /// Get a console by row ID.
    pub async fn get_console_by_id(&self, id: i64) -> Result<Console, DatabaseError> {
        sqlx::query_as::<_, Console>("SELECT * FROM consoles WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Console {id}")))
    }

    /// Enable or disable a console. Returns `false` if it does not exist.
    pub async fn set_console_enabled(
        &self,
        mac_address: &str,
        enabled: bool,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE consoles SET enabled = ? WHERE mac_address = ?")
            .bind(enabled)
            .bind(mac_address)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Consoles seen after `cutoff`, most recent first.
    pub async fn list_consoles_seen_since(
        &self,
        cutoff: i64,
    ) -> Result<Vec<Console>, DatabaseError> {
        let consoles = sqlx::query_as::<_, Console>(
            "SELECT * FROM consoles WHERE last_seen > ? ORDER BY last_seen DESC",
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;

        Ok(consoles)
    }

    /// Count consoles, optionally only those seen after `cutoff`.
    pub async fn count_consoles(&self, seen_since: Option<i64>) -> Result<i64, DatabaseError> {
        let row: (i64,) = if let Some(cutoff) = seen_since {
            sqlx::query_as("SELECT COUNT(*) FROM consoles WHERE last_seen > ?")
                .bind(cutoff)
                .fetch_one(self.pool())
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM consoles")
                .fetch_one(self.pool())
                .await?
        };

        Ok(row.0)
    }

    /// Console counts grouped by platform.
    pub async fn count_consoles_by_platform(&self) -> Result<Vec<(String, i64)>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT platform, COUNT(*) FROM consoles GROUP BY platform ORDER BY platform",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
