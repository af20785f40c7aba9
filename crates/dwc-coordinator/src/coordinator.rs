//! Entry points for inbound client events.
//!
//! Every event is checked against access control before it reaches the
//! component that owns the state it touches.

use std::sync::Arc;

use dwc_core::friend_code::FriendCodeCodec;
use dwc_core::liveness::Clock;
use serde::Serialize;
use tracing::info;

use crate::access::{AccessControl, AccessRequest, Denial};
use crate::error::{CoordinatorError, Result};
use crate::matchmaking::MatchmakingQueue;
use crate::natneg::NatNegotiationTracker;
use crate::registry::{ConsoleAttrs, ConsoleRegistry, ProfileRegistry, normalize_mac};
use crate::servers::{GameServerRegistry, ServerRegistration};
use crate::session::{NasLoginLog, SessionManager};
use crate::stats::StatisticsRecorder;
use crate::storage::{
    BanType, Console, GameServer, NatNeg, Pending, Platform, Profile, ProfileAttrs, StateDatabase,
};

/// A GP login from a console.
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub user_id: String,
    pub game_id: String,
    pub mac_address: String,
    pub ip_address: String,
    pub platform: Platform,
    pub device_name: String,
    pub profile: ProfileAttrs,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub console: Console,
    pub profile: Profile,
    pub session_key: String,
}

/// All coordinator components over one shared database and clock.
#[derive(Clone)]
pub struct Coordinator {
    consoles: ConsoleRegistry,
    profiles: ProfileRegistry,
    sessions: SessionManager,
    nas: NasLoginLog,
    matchmaking: MatchmakingQueue,
    natneg: NatNegotiationTracker,
    servers: GameServerRegistry,
    access: AccessControl,
    stats: StatisticsRecorder,
}

impl Coordinator {
    pub fn new(
        db: StateDatabase,
        clock: Arc<dyn Clock>,
        codec: Arc<dyn FriendCodeCodec>,
        whitelist_mode: bool,
    ) -> Self {
        Self {
            consoles: ConsoleRegistry::new(db.clone(), Arc::clone(&clock)),
            profiles: ProfileRegistry::new(db.clone(), Arc::clone(&clock), codec),
            sessions: SessionManager::new(db.clone(), Arc::clone(&clock)),
            nas: NasLoginLog::new(db.clone(), Arc::clone(&clock)),
            matchmaking: MatchmakingQueue::new(db.clone(), Arc::clone(&clock)),
            natneg: NatNegotiationTracker::new(db.clone(), Arc::clone(&clock)),
            servers: GameServerRegistry::new(db.clone(), Arc::clone(&clock)),
            access: AccessControl::new(db.clone(), Arc::clone(&clock), whitelist_mode),
            stats: StatisticsRecorder::new(db, clock),
        }
    }

    pub const fn consoles(&self) -> &ConsoleRegistry {
        &self.consoles
    }

    pub const fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub const fn nas(&self) -> &NasLoginLog {
        &self.nas
    }

    pub const fn matchmaking(&self) -> &MatchmakingQueue {
        &self.matchmaking
    }

    pub const fn natneg(&self) -> &NatNegotiationTracker {
        &self.natneg
    }

    pub const fn servers(&self) -> &GameServerRegistry {
        &self.servers
    }

    pub const fn access(&self) -> &AccessControl {
        &self.access
    }

    pub const fn stats(&self) -> &StatisticsRecorder {
        &self.stats
    }

    /// Admit a console login and issue a session.
    ///
    /// Access is checked before anything is written. A disabled console or
    /// profile, or a banned profile, is refused after it has been recorded.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome> {
        let mac_address = normalize_mac(&request.mac_address)?;
        self.access
            .evaluate(&AccessRequest {
                user_id: Some(&request.user_id),
                mac_address: Some(&mac_address),
                ip_address: Some(&request.ip_address),
                profile_id: None,
                game_id: Some(&request.game_id),
            })
            .await?;

        let console = self
            .consoles
            .get_or_create(
                &mac_address,
                &ConsoleAttrs {
                    user_id: request.user_id.clone(),
                    device_name: request.device_name.clone(),
                    platform: request.platform,
                },
            )
            .await?;
        if !console.enabled {
            return Err(Denial::ConsoleDisabled { mac_address }.into());
        }

        let attrs = ProfileAttrs {
            console_id: Some(console.id),
            ..request.profile.clone()
        };
        let profile = self
            .profiles
            .get_or_create(&request.user_id, &request.game_id, &attrs)
            .await?;
        if !profile.enabled {
            return Err(Denial::ProfileDisabled {
                profile_id: profile.profile_id,
            }
            .into());
        }
        let profile_id = profile.profile_id.to_string();
        if self.access.is_banned(BanType::Profile, &profile_id).await? {
            return Err(Denial::Banned {
                ban_type: BanType::Profile,
                identifier: profile_id,
            }
            .into());
        }

        let session_key = self.sessions.create(profile.profile_id).await?;
        info!(
            profile_id = profile.profile_id,
            mac = %console.mac_address,
            game_id = %profile.game_id,
            "Login accepted"
        );
        Ok(LoginOutcome {
            console,
            profile,
            session_key,
        })
    }

    /// Queue the session's profile in a matchmaking group.
    pub async fn join_match(
        &self,
        session_key: &str,
        group_id: i64,
        client_ip: Option<&str>,
    ) -> Result<Pending> {
        let session = self.sessions.get(session_key).await?;
        if !self.sessions.is_active(&session) {
            return Err(CoordinatorError::SessionExpired(format!(
                "profile {}",
                session.profile_id
            )));
        }
        let profile = self.profiles.lookup_by_id(session.profile_id).await?;
        let mac_address = self.console_mac(&profile).await?;

        self.access
            .evaluate(&AccessRequest {
                user_id: Some(&profile.user_id),
                mac_address: mac_address.as_deref(),
                ip_address: client_ip,
                profile_id: Some(profile.profile_id),
                game_id: Some(&profile.game_id),
            })
            .await?;

        self.matchmaking.join(profile.profile_id, group_id).await
    }

    /// Register a game server after checking its host and address.
    pub async fn register_server(&self, registration: &ServerRegistration) -> Result<GameServer> {
        let host = self.profiles.lookup_by_id(registration.host_profile_id).await?;
        let mac_address = self.console_mac(&host).await?;
        self.access
            .evaluate(&AccessRequest {
                user_id: Some(&host.user_id),
                mac_address: mac_address.as_deref(),
                ip_address: Some(&registration.ip_address),
                profile_id: Some(host.profile_id),
                game_id: Some(&host.game_id),
            })
            .await?;

        self.servers.register(registration).await
    }

    /// MAC of the console the profile is bound to, if any.
    async fn console_mac(&self, profile: &Profile) -> Result<Option<String>> {
        let Some(console_id) = profile.console_id else {
            return Ok(None);
        };
        match self.consoles.lookup_by_id(console_id).await {
            Ok(console) => Ok(Some(console.mac_address)),
            Err(CoordinatorError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Record a NAT negotiation probe from a client endpoint.
    pub async fn probe_nat(&self, cookie: u64, addr: &str, port: u16) -> Result<NatNeg> {
        self.access
            .evaluate(&AccessRequest {
                ip_address: Some(addr),
                ..AccessRequest::default()
            })
            .await?;
        self.natneg.register(cookie, addr, port).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::access::BanRequest;
    use crate::storage::ProfilePatch;
    use dwc_core::friend_code::LegacyCodec;
    use dwc_core::liveness::ManualClock;

    const T0: i64 = 1_700_000_000;

    async fn coordinator(whitelist_mode: bool) -> (Coordinator, Arc<ManualClock>) {
        let db = StateDatabase::open_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(T0));
        let coordinator = Coordinator::new(db, clock.clone(), Arc::new(LegacyCodec), whitelist_mode);
        (coordinator, clock)
    }

    fn login_request() -> LoginRequest {
        LoginRequest {
            user_id: "4012345".into(),
            game_id: "ADAJ".into(),
            mac_address: "0009BF112233".into(),
            ip_address: "203.0.113.5".into(),
            platform: Platform::Ds,
            device_name: "DS Lite".into(),
            profile: ProfileAttrs {
                uniquenick: "racer".into(),
                ..ProfileAttrs::default()
            },
        }
    }

    fn permanent(ban_type: BanType, identifier: &str) -> BanRequest<'_> {
        BanRequest {
            ban_type,
            identifier,
            reason: "abuse",
            banned_by: "admin",
            duration_secs: None,
        }
    }

    #[tokio::test]
    async fn login_creates_console_profile_and_session() {
        let (coordinator, _clock) = coordinator(false).await;
        let outcome = coordinator.login(&login_request()).await.unwrap();

        assert_eq!(outcome.console.mac_address, "00:09:bf:11:22:33");
        assert_eq!(outcome.profile.console_id, Some(outcome.console.id));
        assert_eq!(outcome.profile.cfc, "4982-1620-6337");
        assert_eq!(
            coordinator
                .sessions()
                .resolve(&outcome.session_key)
                .await
                .unwrap()
                .profile_id,
            outcome.profile.profile_id
        );

        let again = coordinator.login(&login_request()).await.unwrap();
        assert_eq!(again.profile.profile_id, outcome.profile.profile_id);
        assert_ne!(again.session_key, outcome.session_key);
    }

    #[tokio::test]
    async fn banned_ip_is_refused_before_anything_is_written() {
        let (coordinator, _clock) = coordinator(false).await;
        coordinator
            .access()
            .add_ban(&permanent(BanType::Ip, "203.0.113.5"))
            .await
            .unwrap();

        let err = coordinator.login(&login_request()).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::AccessDenied(Denial::Banned { .. })));
        assert!(coordinator.consoles().lookup("0009BF112233").await.is_err());
    }

    #[tokio::test]
    async fn disabled_console_and_profile_are_refused() {
        let (coordinator, _clock) = coordinator(false).await;
        let outcome = coordinator.login(&login_request()).await.unwrap();

        let patch = ProfilePatch {
            enabled: Some(false),
            ..ProfilePatch::default()
        };
        coordinator
            .profiles()
            .update(outcome.profile.profile_id, &patch)
            .await
            .unwrap();
        assert!(matches!(
            coordinator.login(&login_request()).await,
            Err(CoordinatorError::AccessDenied(Denial::ProfileDisabled { .. }))
        ));

        coordinator.consoles().set_enabled("0009BF112233", false).await.unwrap();
        assert!(matches!(
            coordinator.login(&login_request()).await,
            Err(CoordinatorError::AccessDenied(Denial::ConsoleDisabled { .. }))
        ));
    }

    #[tokio::test]
    async fn whitelist_mode_requires_entry() {
        let (coordinator, _clock) = coordinator(true).await;
        assert!(matches!(
            coordinator.login(&login_request()).await,
            Err(CoordinatorError::AccessDenied(Denial::NotWhitelisted { .. }))
        ));

        coordinator
            .access()
            .add_to_whitelist("4012345", "00:09:bf:11:22:33", "")
            .await
            .unwrap();
        coordinator.login(&login_request()).await.unwrap();
    }

    #[tokio::test]
    async fn join_match_requires_active_session() {
        let (coordinator, clock) = coordinator(false).await;
        let outcome = coordinator.login(&login_request()).await.unwrap();

        let pending = coordinator
            .join_match(&outcome.session_key, 9, Some("203.0.113.5"))
            .await
            .unwrap();
        assert_eq!(pending.profile_id, outcome.profile.profile_id);

        clock.advance(30 * 60);
        assert!(matches!(
            coordinator.join_match(&outcome.session_key, 9, None).await,
            Err(CoordinatorError::SessionExpired(_))
        ));
    }

    #[tokio::test]
    async fn join_match_checks_game_deny_list() {
        let (coordinator, _clock) = coordinator(false).await;
        let outcome = coordinator.login(&login_request()).await.unwrap();
        coordinator
            .access()
            .add_to_denylist("4012345", "ADAJ", "griefing", "admin")
            .await
            .unwrap();

        assert!(matches!(
            coordinator.join_match(&outcome.session_key, 9, None).await,
            Err(CoordinatorError::AccessDenied(Denial::DeniedForGame { .. }))
        ));
    }

    #[tokio::test]
    async fn register_server_checks_host() {
        let (coordinator, _clock) = coordinator(false).await;
        let outcome = coordinator.login(&login_request()).await.unwrap();
        let host = registration(outcome.profile.profile_id);
        let server = coordinator.register_server(&host).await.unwrap();
        assert_eq!(server.game_data, "{}");

        coordinator
            .access()
            .add_ban(&permanent(BanType::Profile, &outcome.profile.profile_id.to_string()))
            .await
            .unwrap();
        assert!(matches!(
            coordinator.register_server(&host).await,
            Err(CoordinatorError::AccessDenied(_))
        ));
    }

    fn registration(host_profile_id: i64) -> ServerRegistration {
        ServerRegistration {
            server_id: "srv-1".into(),
            game_name: "mariokartds".into(),
            host_profile_id,
            ip_address: "198.51.100.7".into(),
            port: 27900,
            max_players: 4,
            current_players: 0,
            game_data: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn whitelist_removal_blocks_join_and_hosting() {
        let (coordinator, _clock) = coordinator(true).await;
        coordinator
            .access()
            .add_to_whitelist("4012345", "00:09:bf:11:22:33", "")
            .await
            .unwrap();
        let outcome = coordinator.login(&login_request()).await.unwrap();
        let host = registration(outcome.profile.profile_id);

        coordinator.join_match(&outcome.session_key, 9, None).await.unwrap();
        coordinator.register_server(&host).await.unwrap();

        coordinator.access().remove_from_whitelist("4012345").await.unwrap();
        assert!(matches!(
            coordinator.join_match(&outcome.session_key, 10, None).await,
            Err(CoordinatorError::AccessDenied(Denial::NotWhitelisted { .. }))
        ));
        assert!(matches!(
            coordinator.register_server(&host).await,
            Err(CoordinatorError::AccessDenied(Denial::NotWhitelisted { .. }))
        ));
        assert!(coordinator.matchmaking().members_of(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn whitelist_mode_refuses_hosts_without_console() {
        let (coordinator, _clock) = coordinator(true).await;
        let profile = coordinator
            .profiles()
            .get_or_create("4012345", "ADAJ", &ProfileAttrs::default())
            .await
            .unwrap();
        assert_eq!(profile.console_id, None);

        assert!(matches!(
            coordinator.register_server(&registration(profile.profile_id)).await,
            Err(CoordinatorError::AccessDenied(Denial::NotWhitelisted { .. }))
        ));
    }

    #[tokio::test]
    async fn console_mac_ban_applies_after_login() {
        let (coordinator, _clock) = coordinator(false).await;
        let outcome = coordinator.login(&login_request()).await.unwrap();
        coordinator
            .access()
            .add_ban(&permanent(BanType::Mac, "00:09:bf:11:22:33"))
            .await
            .unwrap();

        assert!(matches!(
            coordinator.join_match(&outcome.session_key, 9, None).await,
            Err(CoordinatorError::AccessDenied(Denial::Banned {
                ban_type: BanType::Mac,
                ..
            }))
        ));
        assert!(matches!(
            coordinator
                .register_server(&registration(outcome.profile.profile_id))
                .await,
            Err(CoordinatorError::AccessDenied(Denial::Banned {
                ban_type: BanType::Mac,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn probe_nat_refuses_banned_address() {
        let (coordinator, _clock) = coordinator(false).await;
        coordinator.probe_nat(42, "1.1.1.1", 1000).await.unwrap();

        coordinator
            .access()
            .add_ban(&permanent(BanType::Ip, "1.1.1.1"))
            .await
            .unwrap();
        assert!(matches!(
            coordinator.probe_nat(42, "1.1.1.1", 2000).await,
            Err(CoordinatorError::AccessDenied(_))
        ));
        assert_eq!(coordinator.natneg().resolve(42).await.unwrap().client_port, 1000);
    }
}
