#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! End-to-end flows across the coordinator components.
//!
//! Concurrency tests use a file-backed database so the pool really hands out
//! several connections.

use std::sync::Arc;

use dwc_coordinator::access::BanRequest;
use dwc_coordinator::registry::ProfileRegistry;
use dwc_coordinator::servers::ServerRegistration;
use dwc_coordinator::storage::{BanType, ProfileAttrs, StateDatabase};
use dwc_coordinator::{Coordinator, CoordinatorError, LoginRequest};
use dwc_core::friend_code::{self, FriendCodeCodec, LegacyCodec};
use dwc_core::liveness::ManualClock;

const T0: i64 = 1_700_000_000;

async fn coordinator() -> (Coordinator, Arc<ManualClock>) {
    let db = StateDatabase::open_in_memory().await.unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let coordinator = Coordinator::new(db, clock.clone(), Arc::new(LegacyCodec), false);
    (coordinator, clock)
}

/// Create profiles until the last one has `profile_id == target`.
async fn profile_with_id(coordinator: &Coordinator, target: i64) -> i64 {
    let mut id = 0;
    let mut n = 0;
    while id < target {
        n += 1;
        id = coordinator
            .profiles()
            .get_or_create(&format!("user{n}"), "ADAJ", &ProfileAttrs::default())
            .await
            .unwrap()
            .profile_id;
    }
    id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_get_or_create_yields_one_profile() {
    let dir = tempfile::tempdir().unwrap();
    let db = StateDatabase::open(&dir.path().join("state.db")).await.unwrap();
    let registry = ProfileRegistry::new(
        db.clone(),
        Arc::new(ManualClock::new(T0)),
        Arc::new(LegacyCodec),
    );

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .get_or_create("123", "ADAJ", &ProfileAttrs::default())
                .await
                .unwrap()
        }));
    }

    let mut profiles = Vec::new();
    for handle in handles {
        profiles.push(handle.await.unwrap());
    }

    let first = &profiles[0];
    assert!(profiles.iter().all(|p| p == first));
    assert!(!first.cfc.is_empty());
    assert_eq!(db.count_profiles().await.unwrap(), 1);

    let expected = LegacyCodec.derive(u32::try_from(first.profile_id).unwrap(), "ADAJ");
    assert_eq!(first.cfc, expected.display());
}

#[test]
fn friend_code_display_round_trips() {
    let codec = LegacyCodec;
    for pid in [1_u32, 2, 1000, 123_456_789, u32::MAX] {
        for game in ["ADAJ", "RMCJ", "IRAJ"] {
            let code = codec.derive(pid, game);
            assert_eq!(codec.derive(pid, game), code);
            assert_eq!(friend_code::normalize(&code.display()).unwrap(), code.raw());
            assert!(codec.verify(code, game));
        }
    }
}

#[tokio::test]
async fn pending_scenario_join_twice_leave_twice() {
    let (coordinator, _clock) = coordinator().await;
    let profile_id = profile_with_id(&coordinator, 5).await;
    assert_eq!(profile_id, 5);

    let queue = coordinator.matchmaking();
    let first = queue.join(5, 9).await.unwrap();
    let second = queue.join(5, 9).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(queue.members_of(9).await.unwrap().len(), 1);

    assert!(queue.leave(5, 9).await.unwrap());
    assert!(!queue.leave(5, 9).await.unwrap());
}

#[tokio::test]
async fn natneg_scenario_last_registration_wins() {
    let (coordinator, _clock) = coordinator().await;
    coordinator.probe_nat(42, "1.1.1.1", 1000).await.unwrap();
    coordinator.probe_nat(42, "1.1.1.1", 2000).await.unwrap();

    let natneg = coordinator.natneg().resolve(42).await.unwrap();
    assert_eq!(natneg.client_port, 2000);
}

#[tokio::test]
async fn session_active_boundary_and_late_resolve() {
    let (coordinator, clock) = coordinator().await;
    let outcome = coordinator
        .login(&LoginRequest {
            user_id: "123".into(),
            game_id: "ADAJ".into(),
            mac_address: "00:09:bf:11:22:33".into(),
            ip_address: "1.2.3.4".into(),
            ..LoginRequest::default()
        })
        .await
        .unwrap();
    let sessions = coordinator.sessions();

    clock.set(T0 + 29 * 60 + 59);
    let session = sessions.get(&outcome.session_key).await.unwrap();
    assert!(sessions.is_active(&session));

    clock.set(T0 + 30 * 60);
    assert!(!sessions.is_active(&session));
    assert_eq!(
        sessions.resolve(&outcome.session_key).await.unwrap().profile_id,
        outcome.profile.profile_id
    );
    assert!(matches!(
        coordinator.join_match(&outcome.session_key, 1, None).await,
        Err(CoordinatorError::SessionExpired(_))
    ));
}

#[tokio::test]
async fn game_server_heartbeat_lifecycle() {
    let (coordinator, clock) = coordinator().await;
    let host = profile_with_id(&coordinator, 1).await;
    let servers = coordinator.servers();

    assert!(matches!(
        servers.heartbeat("srv-1", None).await,
        Err(CoordinatorError::NotFound(_))
    ));

    let registration = ServerRegistration {
        server_id: "srv-1".into(),
        game_name: "mariokartds".into(),
        host_profile_id: host,
        ip_address: "198.51.100.7".into(),
        port: 27900,
        max_players: 4,
        current_players: 0,
        game_data: serde_json::json!({"region": "eu"}),
    };
    coordinator.register_server(&registration).await.unwrap();

    clock.advance(119);
    let server = servers.get("srv-1").await.unwrap();
    assert!(servers.is_online(&server));
    clock.advance(1);
    assert!(!servers.is_online(&server));
    assert!(servers.list_active(None).await.unwrap().is_empty());

    servers.heartbeat("srv-1", Some(3)).await.unwrap();
    let active = servers.list_active(Some("mariokartds")).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].current_players, 3);
}

#[tokio::test]
async fn is_banned_cases() {
    let (coordinator, clock) = coordinator().await;
    let access = coordinator.access();

    assert!(!access.is_banned(BanType::Ip, "1.2.3.4").await.unwrap());

    let expired = BanRequest {
        ban_type: BanType::Ip,
        identifier: "1.2.3.4",
        reason: "flood",
        banned_by: "admin",
        duration_secs: Some(10),
    };
    access.add_ban(&expired).await.unwrap();
    clock.advance(11);
    assert!(!access.is_banned(BanType::Ip, "1.2.3.4").await.unwrap());

    let permanent = BanRequest {
        duration_secs: None,
        ..expired
    };
    access.add_ban(&permanent).await.unwrap();
    clock.advance(100 * 365 * 86_400);
    assert!(access.is_banned(BanType::Ip, "1.2.3.4").await.unwrap());
}

#[tokio::test]
async fn friend_code_lookup_finds_logged_in_profile() {
    let (coordinator, _clock) = coordinator().await;
    let outcome = coordinator
        .login(&LoginRequest {
            user_id: "123".into(),
            game_id: "ADAJ".into(),
            mac_address: "0009bf112233".into(),
            ip_address: "1.2.3.4".into(),
            ..LoginRequest::default()
        })
        .await
        .unwrap();

    let digits: String = outcome.profile.cfc.chars().filter(char::is_ascii_digit).collect();
    let found = coordinator.profiles().lookup_by_friend_code(&digits).await.unwrap();
    assert_eq!(found.profile_id, outcome.profile.profile_id);
}
