//! Allow-list, per-game deny-list and generic bans.
//!
//! The three predicates are read-only. Administrative mutations are plain
//! upserts and deletes and are not meant to be reachable from clients.

use std::fmt;
use std::sync::Arc;

use dwc_core::liveness::Clock;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{CoordinatorError, Result};
use crate::registry::normalize_mac;
use crate::storage::{
    AllowListEntry, BanParams, BanType, BannedItem, DatabaseError, DenyListEntry, StateDatabase,
};

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Denial {
    Banned {
        ban_type: BanType,
        identifier: String,
    },
    DeniedForGame {
        user_id: String,
        game_id: String,
    },
    NotWhitelisted {
        user_id: String,
    },
    ConsoleDisabled {
        mac_address: String,
    },
    ProfileDisabled {
        profile_id: i64,
    },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Banned {
                ban_type,
                identifier,
            } => write!(f, "{ban_type} {identifier} is banned"),
            Self::DeniedForGame { user_id, game_id } => {
                write!(f, "user {user_id} is banned from {game_id}")
            }
            Self::NotWhitelisted { user_id } => write!(f, "user {user_id} is not whitelisted"),
            Self::ConsoleDisabled { mac_address } => write!(f, "console {mac_address} is disabled"),
            Self::ProfileDisabled { profile_id } => write!(f, "profile {profile_id} is disabled"),
        }
    }
}

/// Identity facts known about an inbound client event. Absent facts are
/// skipped by [`AccessControl::evaluate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessRequest<'a> {
    pub user_id: Option<&'a str>,
    pub mac_address: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub profile_id: Option<i64>,
    pub game_id: Option<&'a str>,
}

/// Administrative ban request.
#[derive(Debug, Clone)]
pub struct BanRequest<'a> {
    pub ban_type: BanType,
    pub identifier: &'a str,
    pub reason: &'a str,
    pub banned_by: &'a str,
    /// `None` bans permanently.
    pub duration_secs: Option<i64>,
}

/// An active ban as shown to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BanDetails {
    pub reason: String,
    pub banned_by: String,
    pub banned_at: i64,
    pub expires_at: Option<i64>,
}

/// Parse a ban type tag (`ip`, `mac`, `profile` or `userid`).
pub fn parse_ban_type(tag: &str) -> Result<BanType> {
    tag.parse()
        .map_err(|_| CoordinatorError::InvalidFormat(format!("ban type {tag}")))
}

/// MAC identifiers are stored in canonical form so lookups match however the
/// address was written. Anything that is not a MAC is kept verbatim.
fn canonical_identifier(ban_type: BanType, identifier: &str) -> String {
    match ban_type {
        BanType::Mac => normalize_mac(identifier).unwrap_or_else(|_| identifier.to_string()),
        _ => identifier.to_string(),
    }
}

/// Expiry for a ban of `duration_secs` starting at `now`. Durations must be
/// positive and the expiry must fit in an `i64`.
fn ban_expiry(now: i64, duration_secs: Option<i64>) -> Result<Option<i64>> {
    let Some(secs) = duration_secs else {
        return Ok(None);
    };
    if secs <= 0 {
        return Err(CoordinatorError::InvalidFormat(format!(
            "ban duration {secs}s must be positive"
        )));
    }
    now.checked_add(secs)
        .map(Some)
        .ok_or_else(|| CoordinatorError::InvalidFormat(format!("ban duration {secs}s is too long")))
}

#[derive(Clone)]
pub struct AccessControl {
    db: StateDatabase,
    clock: Arc<dyn Clock>,
    whitelist_mode: bool,
}

impl AccessControl {
    pub fn new(db: StateDatabase, clock: Arc<dyn Clock>, whitelist_mode: bool) -> Self {
        Self {
            db,
            clock,
            whitelist_mode,
        }
    }

    pub const fn whitelist_mode(&self) -> bool {
        self.whitelist_mode
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    /// True only for an enabled entry whose MAC matches.
    pub async fn is_whitelisted(&self, user_id: &str, mac: &str) -> Result<bool> {
        let mac_address = normalize_mac(mac)?;
        match self.db.get_allow_entry(user_id).await {
            Ok(entry) => Ok(entry.enabled && entry.mac_address == mac_address),
            Err(DatabaseError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Any deny-list entry for the pair denies.
    pub async fn is_denied(&self, user_id: &str, game_id: &str) -> Result<bool> {
        Ok(self.db.deny_entry_exists(user_id, game_id).await?)
    }

    /// A ban is active if it has no expiry or expires after now.
    pub async fn is_banned(&self, ban_type: BanType, identifier: &str) -> Result<bool> {
        let identifier = canonical_identifier(ban_type, identifier);
        let ban = self.db.get_ban(ban_type, &identifier).await?;
        Ok(ban.is_some_and(|b| b.is_active(self.clock.now())))
    }

    /// Run every applicable check in order and return the first denial.
    ///
    /// Order: ip ban, mac ban, userid ban, profile ban, game deny-list, then
    /// the allow-list when whitelist mode is on. The allow-list applies to
    /// every request that names a user; without a MAC such a user is not
    /// whitelisted.
    pub async fn first_denial(&self, request: &AccessRequest<'_>) -> Result<Option<Denial>> {
        let bans = [
            (BanType::Ip, request.ip_address.map(str::to_string)),
            (BanType::Mac, request.mac_address.map(str::to_string)),
            (BanType::UserId, request.user_id.map(str::to_string)),
            (BanType::Profile, request.profile_id.map(|id| id.to_string())),
        ];
        for (ban_type, identifier) in bans {
            let Some(identifier) = identifier else {
                continue;
            };
            if self.is_banned(ban_type, &identifier).await? {
                return Ok(Some(Denial::Banned {
                    ban_type,
                    identifier: canonical_identifier(ban_type, &identifier),
                }));
            }
        }

        if let (Some(user_id), Some(game_id)) = (request.user_id, request.game_id) {
            if self.is_denied(user_id, game_id).await? {
                return Ok(Some(Denial::DeniedForGame {
                    user_id: user_id.to_string(),
                    game_id: game_id.to_string(),
                }));
            }
        }

        if let (true, Some(user_id)) = (self.whitelist_mode, request.user_id) {
            let whitelisted = match request.mac_address {
                Some(mac) => self.is_whitelisted(user_id, mac).await?,
                None => false,
            };
            if !whitelisted {
                return Ok(Some(Denial::NotWhitelisted {
                    user_id: user_id.to_string(),
                }));
            }
        }

        Ok(None)
    }

    /// Like [`Self::first_denial`], surfacing a denial as `AccessDenied`.
    pub async fn evaluate(&self, request: &AccessRequest<'_>) -> Result<()> {
        match self.first_denial(request).await? {
            None => Ok(()),
            Some(denial) => {
                warn!(%denial, "Access denied");
                Err(denial.into())
            }
        }
    }

    // =========================================================================
    // Administration
    // =========================================================================

    pub async fn add_to_whitelist(
        &self,
        user_id: &str,
        mac: &str,
        notes: &str,
    ) -> Result<AllowListEntry> {
        let mac_address = normalize_mac(mac)?;
        let entry = self
            .db
            .upsert_allow_entry(user_id, &mac_address, notes, self.clock.now())
            .await?;
        info!(user_id = %user_id, mac = %mac_address, "Whitelisted");
        Ok(entry)
    }

    pub async fn set_whitelist_enabled(&self, user_id: &str, enabled: bool) -> Result<bool> {
        Ok(self.db.set_allow_enabled(user_id, enabled).await?)
    }

    pub async fn remove_from_whitelist(&self, user_id: &str) -> Result<bool> {
        let removed = self.db.delete_allow_entry(user_id).await?;
        if removed {
            info!(user_id = %user_id, "Removed from whitelist");
        }
        Ok(removed)
    }

    pub async fn add_to_denylist(
        &self,
        user_id: &str,
        game_id: &str,
        reason: &str,
        banned_by: &str,
    ) -> Result<DenyListEntry> {
        let entry = self
            .db
            .upsert_deny_entry(user_id, game_id, reason, banned_by, self.clock.now())
            .await?;
        info!(user_id = %user_id, game_id = %game_id, banned_by = %banned_by, "Added to deny-list");
        Ok(entry)
    }

    pub async fn remove_from_denylist(&self, user_id: &str, game_id: &str) -> Result<bool> {
        Ok(self.db.delete_deny_entry(user_id, game_id).await?)
    }

    pub async fn add_ban(&self, request: &BanRequest<'_>) -> Result<BannedItem> {
        let now = self.clock.now();
        let identifier = canonical_identifier(request.ban_type, request.identifier);
        let params = BanParams {
            ban_type: request.ban_type,
            identifier: &identifier,
            reason: request.reason,
            banned_by: request.banned_by,
            expires_at: ban_expiry(now, request.duration_secs)?,
        };
        let ban = self.db.upsert_ban(&params, now).await?;
        info!(
            ban_type = %request.ban_type,
            identifier = %identifier,
            expires_at = ?ban.expires_at,
            "Ban added"
        );
        Ok(ban)
    }

    pub async fn remove_ban(&self, ban_type: BanType, identifier: &str) -> Result<bool> {
        let identifier = canonical_identifier(ban_type, identifier);
        let removed = self.db.delete_ban(ban_type, &identifier).await?;
        if removed {
            info!(ban_type = %ban_type, identifier = %identifier, "Ban removed");
        }
        Ok(removed)
    }

    pub async fn list_active_bans(&self) -> Result<Vec<BannedItem>> {
        Ok(self.db.list_active_bans(self.clock.now()).await?)
    }

    /// Details of the ban on `identifier`, if one is active.
    pub async fn ban_details(
        &self,
        ban_type: BanType,
        identifier: &str,
    ) -> Result<Option<BanDetails>> {
        let identifier = canonical_identifier(ban_type, identifier);
        let now = self.clock.now();
        let details = self
            .db
            .get_ban(ban_type, &identifier)
            .await?
            .filter(|ban| ban.is_active(now))
            .map(|ban| BanDetails {
                reason: ban.reason,
                banned_by: ban.banned_by,
                banned_at: ban.banned_at,
                expires_at: ban.expires_at,
            });
        Ok(details)
    }

    /// Delete bans whose expiry has passed.
    pub async fn purge_expired_bans(&self) -> Result<u64> {
        let purged = self.db.delete_expired_bans(self.clock.now()).await?;
        if purged > 0 {
            info!(purged, "Purged expired bans");
        }
        Ok(purged)
    }
}
