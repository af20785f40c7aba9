//! Data models for coordinator storage.

use std::fmt;
use std::str::FromStr;

use dwc_core::liveness::{LivenessWindow, Presence};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Console {
    pub id: i64,
    pub mac_address: String,
    pub user_id: String,
    pub device_name: String,
    pub platform: String,
    pub enabled: bool,
    pub registered_at: i64,
    pub last_seen: i64,
}

impl Console {
    pub fn presence(&self, now: i64) -> Presence {
        Presence::classify(self.last_seen, now)
    }

    pub fn is_online(&self, now: i64) -> bool {
        LivenessWindow::ONLINE.contains(self.last_seen, now)
    }
}

/// Console hardware family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Platform {
    #[default]
    #[serde(rename = "DS")]
    Ds,
    #[serde(rename = "DSi")]
    Dsi,
    Wii,
}

impl Platform {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ds => "DS",
            Self::Dsi => "DSi",
            Self::Wii => "Wii",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DS" => Ok(Self::Ds),
            "DSi" => Ok(Self::Dsi),
            "Wii" => Ok(Self::Wii),
            other => Err(format!("unknown platform {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub profile_id: i64,
    pub user_id: String,
    pub game_id: String,
    pub console_id: Option<i64>,
    pub password: String,
    pub email: String,
    pub gsbrcd: String,
    pub uniquenick: String,
    pub pid: String,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub loc: String,
    pub zipcode: String,
    pub firstname: String,
    pub lastname: String,
    pub birth: String,
    pub aim: String,
    pub csnum: String,
    /// Cached friend code in display form, written in the creating transaction.
    pub cfc: String,
    pub bssid: String,
    pub devname: String,
    pub stat: String,
    pub partnerid: Option<i64>,
    pub enabled: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub session_key: String,
    pub profile_id: i64,
    pub login_time: i64,
}

impl Session {
    /// Active for 30 minutes from login; activity does not extend it.
    pub fn is_active(&self, now: i64) -> bool {
        LivenessWindow::SESSION_ACTIVE.contains(self.login_time, now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NasLogin {
    pub id: i64,
    pub user_id: String,
    pub auth_token: String,
    pub data: String,
    pub ip_address: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Pending {
    pub id: i64,
    pub profile_id: i64,
    pub group_id: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NatNeg {
    pub cookie: i64,
    pub client_addr: String,
    pub client_port: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GameServer {
    pub server_id: String,
    pub game_name: String,
    pub host_profile_id: Option<i64>,
    pub ip_address: String,
    pub port: i64,
    pub max_players: i64,
    pub current_players: i64,
    pub game_data: String,
    pub registered_at: i64,
    pub last_heartbeat: i64,
}

impl GameServer {
    pub fn is_online(&self, now: i64) -> bool {
        LivenessWindow::HEARTBEAT.contains(self.last_heartbeat, now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AllowListEntry {
    pub user_id: String,
    pub mac_address: String,
    pub enabled: bool,
    pub notes: String,
    pub added_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DenyListEntry {
    pub user_id: String,
    pub game_id: String,
    pub reason: String,
    pub banned_by: String,
    pub banned_at: i64,
}

/// Kind of identifier a generic ban applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanType {
    Ip,
    Mac,
    Profile,
    UserId,
}

impl BanType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Mac => "mac",
            Self::Profile => "profile",
            Self::UserId => "userid",
        }
    }
}

impl fmt::Display for BanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip" => Ok(Self::Ip),
            "mac" => Ok(Self::Mac),
            "profile" => Ok(Self::Profile),
            "userid" => Ok(Self::UserId),
            other => Err(format!("unknown ban type {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BannedItem {
    pub ban_type: String,
    pub identifier: String,
    pub reason: String,
    pub banned_by: String,
    pub banned_at: i64,
    /// `None` means permanent.
    pub expires_at: Option<i64>,
}

impl BannedItem {
    pub fn is_active(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServerStatistic {
    pub id: i64,
    pub timestamp: i64,
    pub active_consoles: i64,
    pub active_profiles: i64,
    pub active_servers: i64,
    pub total_logins_today: i64,
}
