//! Matchmaking queue (pending) queries.

use super::db::{DatabaseError, StateDatabase};
use super::models::{Pending, Profile};

impl StateDatabase {
    // =========================================================================
    // Pending queries
    // =========================================================================

    /// Add a profile to a group. Joining twice returns the existing row.
    pub async fn join_pending(
        &self,
        profile_id: i64,
        group_id: i64,
        now: i64,
    ) -> Result<Pending, DatabaseError> {
        sqlx::query(
            "INSERT INTO pending (profile_id, group_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(profile_id, group_id) DO NOTHING",
        )
        .bind(profile_id)
        .bind(group_id)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_pending(profile_id, group_id).await
    }

    /// Get a pending entry.
    pub async fn get_pending(
        &self,
        profile_id: i64,
        group_id: i64,
    ) -> Result<Pending, DatabaseError> {
        sqlx::query_as::<_, Pending>(
            "SELECT * FROM pending WHERE profile_id = ? AND group_id = ?",
        )
        .bind(profile_id)
        .bind(group_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| {
            DatabaseError::NotFound(format!("Pending profile {profile_id} in group {group_id}"))
        })
    }

    /// Remove a profile from a group. Returns `false` if it was not queued.
    pub async fn leave_pending(&self, profile_id: i64, group_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM pending WHERE profile_id = ? AND group_id = ?")
            .bind(profile_id)
            .bind(group_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Profiles waiting in a group, in join order.
    pub async fn list_pending_profiles(&self, group_id: i64) -> Result<Vec<Profile>, DatabaseError> {
        let profiles = sqlx::query_as::<_, Profile>(
            "SELECT p.* FROM pending q JOIN profiles p ON p.profile_id = q.profile_id \
             WHERE q.group_id = ? ORDER BY q.id",
        )
        .bind(group_id)
        .fetch_all(self.pool())
        .await?;

        Ok(profiles)
    }
}
