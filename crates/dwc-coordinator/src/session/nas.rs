//! NAS authentication log.

use std::sync::Arc;

use dwc_core::liveness::{Clock, LivenessWindow};
use tracing::info;

use crate::error::{CoordinatorError, Result};
use crate::storage::{DatabaseError, NasLogin, StateDatabase};

/// Append-only record of NAS logins, keyed by the issued auth token.
#[derive(Clone)]
pub struct NasLoginLog {
    db: StateDatabase,
    clock: Arc<dyn Clock>,
}

impl NasLoginLog {
    pub fn new(db: StateDatabase, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Record a login. `data` is the request payload stored as JSON.
    pub async fn record(
        &self,
        user_id: &str,
        auth_token: &str,
        data: &serde_json::Value,
        ip_address: &str,
    ) -> Result<NasLogin> {
        let payload = data.to_string();
        let login = self
            .db
            .create_nas_login(user_id, auth_token, &payload, ip_address, self.clock.now())
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => {
                    CoordinatorError::AlreadyExists("NAS auth token".to_string())
                }
                other => other.into(),
            })?;

        info!(user_id = %user_id, ip = %ip_address, "NAS login recorded");
        Ok(login)
    }

    pub async fn lookup_by_token(&self, auth_token: &str) -> Result<NasLogin> {
        Ok(self.db.get_nas_login_by_token(auth_token).await?)
    }

    /// Logins within the last hour.
    pub async fn count_recent(&self) -> Result<i64> {
        let cutoff = LivenessWindow::RECENT.cutoff(self.clock.now());
        Ok(self.db.count_nas_logins_since(cutoff + 1).await?)
    }

    /// Logins at or after `since`.
    pub async fn count_since(&self, since: i64) -> Result<i64> {
        Ok(self.db.count_nas_logins_since(since).await?)
    }
}
