//! NAS login record queries.

use super::db::{DatabaseError, StateDatabase};
use super::models::NasLogin;

impl StateDatabase {
    // =========================================================================
    // NAS login queries
    // =========================================================================

    /// Record a NAS authentication. A reused auth token fails with
    /// `DatabaseError::Conflict`.
    pub async fn create_nas_login(
        &self,
        user_id: &str,
        auth_token: &str,
        data: &str,
        ip_address: &str,
        now: i64,
    ) -> Result<NasLogin, DatabaseError> {
        sqlx::query(
            "INSERT INTO nas_logins (user_id, auth_token, data, ip_address, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(auth_token)
        .bind(data)
        .bind(ip_address)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_nas_login_by_token(auth_token).await
    }

    /// Get a NAS login by auth token.
    pub async fn get_nas_login_by_token(&self, auth_token: &str) -> Result<NasLogin, DatabaseError> {
        sqlx::query_as::<_, NasLogin>("SELECT * FROM nas_logins WHERE auth_token = ?")
            .bind(auth_token)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound("NAS login for token".to_string()))
    }

    /// Count NAS logins recorded at or after `since`.
    pub async fn count_nas_logins_since(&self, since: i64) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nas_logins WHERE timestamp >= ?")
            .bind(since)
            .fetch_one(self.pool())
            .await?;

        Ok(row.0)
    }
}
