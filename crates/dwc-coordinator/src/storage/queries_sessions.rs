//! GP session queries.

use super::db::{DatabaseError, StateDatabase};
use super::models::{Profile, Session};

impl StateDatabase {
    // =========================================================================
    // Session queries
    // =========================================================================

    /// Insert a session. A duplicate key fails with `DatabaseError::Conflict`;
    /// an existing session is never overwritten.
    pub async fn create_session(
        &self,
        session_key: &str,
        profile_id: i64,
        now: i64,
    ) -> Result<Session, DatabaseError> {
        sqlx::query("INSERT INTO sessions (session_key, profile_id, login_time) VALUES (?, ?, ?)")
            .bind(session_key)
            .bind(profile_id)
            .bind(now)
            .execute(self.pool())
            .await?;

        self.get_session(session_key).await
    }

    /// Get a session by key.
    pub async fn get_session(&self, session_key: &str) -> Result<Session, DatabaseError> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE session_key = ?")
            .bind(session_key)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Session {session_key}")))
    }

    /// Get the profile owning a session.
    pub async fn get_session_profile(&self, session_key: &str) -> Result<Profile, DatabaseError> {
        sqlx::query_as::<_, Profile>(
            "SELECT p.* FROM profiles p JOIN sessions s ON s.profile_id = p.profile_id \
             WHERE s.session_key = ?",
        )
        .bind(session_key)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Session {session_key}")))
    }

    /// Delete a session. Returns `false` if it was already gone.
    pub async fn delete_session(&self, session_key: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_key = ?")
            .bind(session_key)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete sessions that logged in at or before `cutoff`.
    pub async fn delete_sessions_before(&self, cutoff: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE login_time <= ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    /// Sessions that logged in after `cutoff`, newest first.
    pub async fn list_sessions_since(&self, cutoff: i64) -> Result<Vec<Session>, DatabaseError> {
        let sessions = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE login_time > ? ORDER BY login_time DESC",
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;

        Ok(sessions)
    }

    /// Distinct profiles holding a session that logged in after `cutoff`.
    pub async fn count_profiles_with_sessions_since(
        &self,
        cutoff: i64,
    ) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT profile_id) FROM sessions WHERE login_time > ?",
        )
        .bind(cutoff)
        .fetch_one(self.pool())
        .await?;

        Ok(row.0)
    }
}
