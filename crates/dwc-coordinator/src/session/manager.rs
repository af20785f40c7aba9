//! Session issue, lookup and expiry.
//!
//! A session is active for 30 minutes from its login time. Activity does not
//! extend it, and nothing deletes it on expiry except the maintenance sweep,
//! so an expired session can still resolve.

use std::sync::Arc;

use dwc_core::liveness::{Clock, LivenessWindow};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{error, info};

use crate::error::{CoordinatorError, Result};
use crate::storage::{DatabaseError, Profile, Session, StateDatabase};

/// Hex characters in a session key (128 bits).
pub const SESSION_KEY_LEN: usize = 32;

/// Generate a session key from the OS RNG.
pub fn generate_session_key() -> String {
    let mut bytes = [0u8; SESSION_KEY_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Check that `key` is 32 lowercase hex characters.
pub fn validate_session_key(key: &str) -> Result<()> {
    let well_formed = key.len() == SESSION_KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if well_formed {
        Ok(())
    } else {
        Err(CoordinatorError::InvalidFormat(format!("session key {key:?}")))
    }
}

#[derive(Clone)]
pub struct SessionManager {
    db: StateDatabase,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(db: StateDatabase, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Issue a session for an existing profile and return its key.
    pub async fn create(&self, profile_id: i64) -> Result<String> {
        self.db.get_profile(profile_id).await?;
        self.insert(profile_id, generate_session_key()).await
    }

    async fn insert(&self, profile_id: i64, key: String) -> Result<String> {
        match self.db.create_session(&key, profile_id, self.clock.now()).await {
            Ok(_) => {
                info!(profile_id, "Session created");
                Ok(key)
            }
            Err(DatabaseError::Conflict(detail)) => {
                error!(profile_id, "Session key collision");
                Err(CoordinatorError::Conflict(format!("session key collision: {detail}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Profile owning the session. Does not check the activity window.
    pub async fn resolve(&self, session_key: &str) -> Result<Profile> {
        validate_session_key(session_key)?;
        Ok(self.db.get_session_profile(session_key).await?)
    }

    pub async fn get(&self, session_key: &str) -> Result<Session> {
        validate_session_key(session_key)?;
        Ok(self.db.get_session(session_key).await?)
    }

    pub fn is_active(&self, session: &Session) -> bool {
        session.is_active(self.clock.now())
    }

    /// Log out. Returns `false` if the session was already gone.
    pub async fn destroy(&self, session_key: &str) -> Result<bool> {
        let removed = self.db.delete_session(session_key).await?;
        if removed {
            info!("Session destroyed");
        }
        Ok(removed)
    }

    /// Delete every session that logged in `max_age_secs` or more ago.
    pub async fn sweep_expired(&self, max_age_secs: i64) -> Result<u64> {
        let cutoff = LivenessWindow::from_secs(max_age_secs).cutoff(self.clock.now());
        let removed = self.db.delete_sessions_before(cutoff).await?;
        if removed > 0 {
            info!(removed, "Swept expired sessions");
        }
        Ok(removed)
    }

    /// Sessions inside the active window, newest first.
    pub async fn list_active(&self) -> Result<Vec<Session>> {
        let cutoff = LivenessWindow::SESSION_ACTIVE.cutoff(self.clock.now());
        Ok(self.db.list_sessions_since(cutoff).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::ProfileAttrs;
    use dwc_core::liveness::ManualClock;

    const T0: i64 = 1_700_000_000;

    async fn manager() -> (SessionManager, Arc<ManualClock>, i64) {
        let db = StateDatabase::open_in_memory().await.unwrap();
        let (profile, _) = db
            .get_or_create_profile("123", "ADAJ", &ProfileAttrs::default(), T0, |_| {
                Some("0000-0000-0001".into())
            })
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(T0));
        (SessionManager::new(db, clock.clone()), clock, profile.profile_id)
    }

    #[test]
    fn generated_keys_are_well_formed() {
        let a = generate_session_key();
        let b = generate_session_key();
        assert_eq!(a.len(), SESSION_KEY_LEN);
        assert!(validate_session_key(&a).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_keys_rejected() {
        let keys = [
            String::new(),
            "abc".to_string(),
            "A".repeat(32),
            "g".repeat(32),
            "a".repeat(33),
        ];
        for key in &keys {
            assert!(matches!(
                validate_session_key(key),
                Err(CoordinatorError::InvalidFormat(_))
            ));
        }
    }

    #[tokio::test]
    async fn create_requires_profile() {
        let (manager, _clock, _) = manager().await;
        assert!(matches!(
            manager.create(999).await,
            Err(CoordinatorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_and_resolve() {
        let (manager, _clock, profile_id) = manager().await;
        let key = manager.create(profile_id).await.unwrap();
        assert_eq!(manager.resolve(&key).await.unwrap().profile_id, profile_id);
        assert!(matches!(
            manager.resolve(&"0".repeat(32)).await,
            Err(CoordinatorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn colliding_key_fails_loudly() {
        let (manager, _clock, profile_id) = manager().await;
        let key = "0123456789abcdef0123456789abcdef".to_string();
        manager.insert(profile_id, key.clone()).await.unwrap();
        assert!(matches!(
            manager.insert(profile_id, key).await,
            Err(CoordinatorError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn active_window_boundary() {
        let (manager, clock, profile_id) = manager().await;
        let key = manager.create(profile_id).await.unwrap();

        clock.advance(29 * 60 + 59);
        let session = manager.get(&key).await.unwrap();
        assert!(manager.is_active(&session));
        assert_eq!(manager.list_active().await.unwrap().len(), 1);

        clock.advance(1);
        assert!(!manager.is_active(&session));
        assert!(manager.list_active().await.unwrap().is_empty());
        // Still resolvable until swept.
        assert_eq!(manager.resolve(&key).await.unwrap().profile_id, profile_id);
    }

    #[tokio::test]
    async fn sweep_and_destroy() {
        let (manager, clock, profile_id) = manager().await;
        let old = manager.create(profile_id).await.unwrap();
        clock.advance(1800);
        let fresh = manager.create(profile_id).await.unwrap();

        assert_eq!(manager.sweep_expired(1800).await.unwrap(), 1);
        assert!(manager.get(&old).await.is_err());

        assert!(manager.destroy(&fresh).await.unwrap());
        assert!(!manager.destroy(&fresh).await.unwrap());
    }
}
