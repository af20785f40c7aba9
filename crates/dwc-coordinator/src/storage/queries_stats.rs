//! Server statistics snapshot queries. Rows are append-only.

use super::db::{DatabaseError, StateDatabase};
use super::models::ServerStatistic;

/// Counts captured by one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticCounts {
    pub active_consoles: i64,
    pub active_profiles: i64,
    pub active_servers: i64,
    pub total_logins_today: i64,
}

impl StateDatabase {
    // =========================================================================
    // Statistics queries
    // =========================================================================

    /// Append a snapshot.
    pub async fn insert_statistic(
        &self,
        counts: &StatisticCounts,
        now: i64,
    ) -> Result<ServerStatistic, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO server_statistics (timestamp, active_consoles, active_profiles, \
             active_servers, total_logins_today) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(now)
        .bind(counts.active_consoles)
        .bind(counts.active_profiles)
        .bind(counts.active_servers)
        .bind(counts.total_logins_today)
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();
        sqlx::query_as::<_, ServerStatistic>("SELECT * FROM server_statistics WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Statistic {id}")))
    }

    /// Most recent snapshot.
    pub async fn latest_statistic(&self) -> Result<ServerStatistic, DatabaseError> {
        sqlx::query_as::<_, ServerStatistic>(
            "SELECT * FROM server_statistics ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound("No statistics recorded".to_string()))
    }

    /// Snapshots taken at or after `since`, newest first.
    pub async fn list_statistics_since(
        &self,
        since: i64,
    ) -> Result<Vec<ServerStatistic>, DatabaseError> {
        let stats = sqlx::query_as::<_, ServerStatistic>(
            "SELECT * FROM server_statistics WHERE timestamp >= ? ORDER BY timestamp DESC, id DESC",
        )
        .bind(since)
        .fetch_all(self.pool())
        .await?;

        Ok(stats)
    }
}
