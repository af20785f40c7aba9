//! Per-game player profiles.
//!
//! A profile is unique per `(user_id, game_id)`. Its friend code is derived
//! once, inside the creating transaction, and cached in `cfc`.

use std::sync::Arc;

use dwc_core::friend_code::{self, FriendCode, FriendCodeCodec};
use dwc_core::liveness::Clock;
use tracing::{info, warn};

use crate::error::{CoordinatorError, Result};
use crate::storage::{DatabaseError, Profile, ProfileAttrs, ProfilePatch, StateDatabase};

#[derive(Clone)]
pub struct ProfileRegistry {
    db: StateDatabase,
    clock: Arc<dyn Clock>,
    codec: Arc<dyn FriendCodeCodec>,
}

impl ProfileRegistry {
    pub fn new(db: StateDatabase, clock: Arc<dyn Clock>, codec: Arc<dyn FriendCodeCodec>) -> Self {
        Self { db, clock, codec }
    }

    /// Build the derivation callback handed to the storage layer. The game
    /// code is the broadcast code when present, else the game id.
    fn friend_code_for(
        &self,
        game_id: &str,
        attrs: &ProfileAttrs,
    ) -> impl FnOnce(i64) -> Option<String> + Send + use<> {
        let codec = Arc::clone(&self.codec);
        let game_code = friend_code::select_game_code(Some(&attrs.gsbrcd), game_id).to_string();
        move |profile_id| {
            let Ok(pid) = u32::try_from(profile_id) else {
                warn!(profile_id, "Profile id exceeds friend code range");
                return None;
            };
            Some(codec.derive(pid, &game_code).display())
        }
    }

    /// Return the profile for `(user_id, game_id)`, creating it if absent.
    ///
    /// Concurrent callers with the same key all receive the same row; only
    /// one of them creates it.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        game_id: &str,
        attrs: &ProfileAttrs,
    ) -> Result<Profile> {
        let derive = self.friend_code_for(game_id, attrs);
        let (profile, created) = self
            .db
            .get_or_create_profile(user_id, game_id, attrs, self.clock.now(), derive)
            .await?;

        if created {
            info!(
                profile_id = profile.profile_id,
                user_id = %user_id,
                game_id = %game_id,
                friend_code = %profile.cfc,
                "Profile created"
            );
        }
        Ok(profile)
    }

    /// Create a profile; fails with `AlreadyExists` if the pair or the
    /// nickname is taken.
    pub async fn create(
        &self,
        user_id: &str,
        game_id: &str,
        attrs: &ProfileAttrs,
    ) -> Result<Profile> {
        let derive = self.friend_code_for(game_id, attrs);
        let profile = self
            .db
            .create_profile(user_id, game_id, attrs, self.clock.now(), derive)
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(reason) => CoordinatorError::AlreadyExists(reason),
                other => other.into(),
            })?;

        info!(
            profile_id = profile.profile_id,
            user_id = %user_id,
            game_id = %game_id,
            friend_code = %profile.cfc,
            "Profile created"
        );
        Ok(profile)
    }

    pub async fn lookup_by_id(&self, profile_id: i64) -> Result<Profile> {
        Ok(self.db.get_profile(profile_id).await?)
    }

    pub async fn lookup_by_unique_nick(&self, uniquenick: &str) -> Result<Profile> {
        Ok(self.db.get_profile_by_uniquenick(uniquenick).await?)
    }

    /// Find a profile by friend code in any display form
    /// (`1234-5678-9012`, `123456789012`, spaced).
    pub async fn lookup_by_friend_code(&self, display: &str) -> Result<Profile> {
        let raw = friend_code::normalize(display)?;
        let cfc = friend_code::format_raw(raw);
        Ok(self.db.get_profile_by_friend_code(&cfc).await?)
    }

    pub async fn list_by_game(&self, game_id: &str) -> Result<Vec<Profile>> {
        Ok(self.db.list_profiles_by_game(game_id).await?)
    }

    /// Apply a partial update and return the updated profile.
    pub async fn update(&self, profile_id: i64, patch: &ProfilePatch) -> Result<Profile> {
        if !self.db.update_profile(profile_id, patch).await? {
            return Err(CoordinatorError::NotFound(format!("Profile {profile_id}")));
        }
        info!(profile_id, "Profile updated");
        self.lookup_by_id(profile_id).await
    }

    /// Whether `display` carries a valid checksum for `game_code`.
    pub fn verify_friend_code(&self, display: &str, game_code: &str) -> Result<bool> {
        let code: FriendCode = display.parse()?;
        Ok(self.codec.verify(code, game_code))
    }
}
