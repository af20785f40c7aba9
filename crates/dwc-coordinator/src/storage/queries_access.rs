//! Allow-list, deny-list and generic ban queries.
//!
//! Every write here is an upsert or a delete; duplicate keys never error.

use super::db::{DatabaseError, StateDatabase};
use super::models::{AllowListEntry, BanType, BannedItem, DenyListEntry};

/// Parameters for adding or replacing a generic ban.
pub struct BanParams<'a> {
    pub ban_type: BanType,
    pub identifier: &'a str,
    pub reason: &'a str,
    pub banned_by: &'a str,
    /// `None` bans permanently.
    pub expires_at: Option<i64>,
}

impl StateDatabase {
    // =========================================================================
    // Allow-list queries
    // =========================================================================

    /// Bind a user to a MAC address, re-enabling an existing entry.
    pub async fn upsert_allow_entry(
        &self,
        user_id: &str,
        mac_address: &str,
        notes: &str,
        now: i64,
    ) -> Result<AllowListEntry, DatabaseError> {
        sqlx::query(
            "INSERT INTO allow_list (user_id, mac_address, enabled, notes, added_at) \
             VALUES (?, ?, 1, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET mac_address = excluded.mac_address, \
             enabled = 1, notes = excluded.notes",
        )
        .bind(user_id)
        .bind(mac_address)
        .bind(notes)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_allow_entry(user_id).await
    }

    /// Get the allow-list entry for a user.
    pub async fn get_allow_entry(&self, user_id: &str) -> Result<AllowListEntry, DatabaseError> {
        sqlx::query_as::<_, AllowListEntry>("SELECT * FROM allow_list WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Allow-list entry {user_id}")))
    }

    /// Enable or disable an allow-list entry.
    pub async fn set_allow_enabled(&self, user_id: &str, enabled: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE allow_list SET enabled = ? WHERE user_id = ?")
            .bind(enabled)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a user from the allow-list.
    pub async fn delete_allow_entry(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM allow_list WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Deny-list queries
    // =========================================================================

    /// Ban a user from one game, replacing reason and issuer if already banned.
    pub async fn upsert_deny_entry(
        &self,
        user_id: &str,
        game_id: &str,
        reason: &str,
        banned_by: &str,
        now: i64,
    ) -> Result<DenyListEntry, DatabaseError> {
        sqlx::query(
            "INSERT INTO deny_list (user_id, game_id, reason, banned_by, banned_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, game_id) DO UPDATE SET reason = excluded.reason, \
             banned_by = excluded.banned_by",
        )
        .bind(user_id)
        .bind(game_id)
        .bind(reason)
        .bind(banned_by)
        .bind(now)
        .execute(self.pool())
        .await?;

        let entry = sqlx::query_as::<_, DenyListEntry>(
            "SELECT * FROM deny_list WHERE user_id = ? AND game_id = ?",
        )
        .bind(user_id)
        .bind(game_id)
        .fetch_one(self.pool())
        .await?;

        Ok(entry)
    }

    /// Whether a deny-list entry exists for the pair.
    pub async fn deny_entry_exists(&self, user_id: &str, game_id: &str) -> Result<bool, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM deny_list WHERE user_id = ? AND game_id = ?)",
        )
        .bind(user_id)
        .bind(game_id)
        .fetch_one(self.pool())
        .await?;

        Ok(row.0 != 0)
    }

    /// Lift a game ban.
    pub async fn delete_deny_entry(&self, user_id: &str, game_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM deny_list WHERE user_id = ? AND game_id = ?")
            .bind(user_id)
            .bind(game_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Generic ban queries
    // =========================================================================

    /// Add a ban or replace the existing one for the same key.
    pub async fn upsert_ban(
        &self,
        params: &BanParams<'_>,
        now: i64,
    ) -> Result<BannedItem, DatabaseError> {
        sqlx::query(
            "INSERT INTO banned (ban_type, identifier, reason, banned_by, banned_at, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(ban_type, identifier) DO UPDATE SET reason = excluded.reason, \
             banned_by = excluded.banned_by, expires_at = excluded.expires_at",
        )
        .bind(params.ban_type.as_str())
        .bind(params.identifier)
        .bind(params.reason)
        .bind(params.banned_by)
        .bind(now)
        .bind(params.expires_at)
        .execute(self.pool())
        .await?;

        self.get_ban(params.ban_type, params.identifier)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Ban {}:{}", params.ban_type, params.identifier)))
    }

    /// Get a ban row regardless of expiry.
    pub async fn get_ban(
        &self,
        ban_type: BanType,
        identifier: &str,
    ) -> Result<Option<BannedItem>, DatabaseError> {
        let ban = sqlx::query_as::<_, BannedItem>(
            "SELECT * FROM banned WHERE ban_type = ? AND identifier = ?",
        )
        .bind(ban_type.as_str())
        .bind(identifier)
        .fetch_optional(self.pool())
        .await?;

        Ok(ban)
    }

    /// Remove a ban.
    pub async fn delete_ban(&self, ban_type: BanType, identifier: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM banned WHERE ban_type = ? AND identifier = ?")
            .bind(ban_type.as_str())
            .bind(identifier)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bans that are permanent or expire after `now`, newest first.
    pub async fn list_active_bans(&self, now: i64) -> Result<Vec<BannedItem>, DatabaseError> {
        let bans = sqlx::query_as::<_, BannedItem>(
            "SELECT * FROM banned WHERE expires_at IS NULL OR expires_at > ? ORDER BY banned_at DESC",
        )
        .bind(now)
        .fetch_all(self.pool())
        .await?;

        Ok(bans)
    }

    /// Count bans that are permanent or expire after `now`.
    pub async fn count_active_bans(&self, now: i64) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM banned WHERE expires_at IS NULL OR expires_at > ?",
        )
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(row.0)
    }

    /// Delete bans whose expiry is at or before `now`.
    pub async fn delete_expired_bans(&self, now: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM banned WHERE expires_at IS NOT NULL AND expires_at <= ?")
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
