//! NAT negotiation cookie queries.

use super::db::{DatabaseError, StateDatabase};
use super::models::NatNeg;

impl StateDatabase {
    // =========================================================================
    // NAT negotiation queries
    // =========================================================================

    /// Map a cookie to an endpoint, replacing any previous mapping.
    pub async fn upsert_natneg(
        &self,
        cookie: i64,
        client_addr: &str,
        client_port: u16,
        now: i64,
    ) -> Result<NatNeg, DatabaseError> {
        sqlx::query(
            "INSERT INTO natneg (cookie, client_addr, client_port, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(cookie) DO UPDATE SET client_addr = excluded.client_addr, \
             client_port = excluded.client_port, created_at = excluded.created_at",
        )
        .bind(cookie)
        .bind(client_addr)
        .bind(client_port)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_natneg(cookie).await
    }

    /// Get the endpoint for a cookie.
    pub async fn get_natneg(&self, cookie: i64) -> Result<NatNeg, DatabaseError> {
        sqlx::query_as::<_, NatNeg>("SELECT * FROM natneg WHERE cookie = ?")
            .bind(cookie)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("NAT cookie {cookie}")))
    }

    /// Delete a cookie mapping.
    pub async fn delete_natneg(&self, cookie: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM natneg WHERE cookie = ?")
            .bind(cookie)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete mappings registered at or before `cutoff`.
    pub async fn delete_natneg_before(&self, cutoff: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM natneg WHERE created_at <= ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
