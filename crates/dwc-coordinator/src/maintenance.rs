//! Background housekeeping.
//!
//! Liveness is always derived at read time, so nothing here is needed for
//! correctness. The loop only keeps tables small and records statistics.

use std::time::Duration;

use dwc_core::config::MaintenanceConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::coordinator::Coordinator;

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: u64,
    pub natneg: u64,
    pub bans: u64,
    pub servers: u64,
}

/// Run every cleanup once. A failing step is logged and the rest still run.
pub async fn sweep(coordinator: &Coordinator, config: &MaintenanceConfig) -> SweepReport {
    let mut report = SweepReport::default();

    match coordinator.sessions().sweep_expired(config.session_max_age_secs).await {
        Ok(n) => report.sessions = n,
        Err(e) => warn!(error = %e, "Session sweep failed"),
    }
    match coordinator.natneg().reap_older_than(config.natneg_max_age_secs).await {
        Ok(n) => report.natneg = n,
        Err(e) => warn!(error = %e, "NAT cookie reap failed"),
    }
    match coordinator.access().purge_expired_bans().await {
        Ok(n) => report.bans = n,
        Err(e) => warn!(error = %e, "Ban purge failed"),
    }
    match coordinator.servers().purge_stale(config.server_max_silence_secs).await {
        Ok(n) => report.servers = n,
        Err(e) => warn!(error = %e, "Stale server purge failed"),
    }

    report
}

/// Spawn the maintenance loop. It runs until `shutdown` changes.
pub fn spawn(
    coordinator: Coordinator,
    config: MaintenanceConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sweep_timer =
            tokio::time::interval(Duration::from_secs(config.sweep_interval_secs.max(1)));
        let mut snapshot_timer =
            tokio::time::interval(Duration::from_secs(config.snapshot_interval_secs.max(1)));
        sweep_timer.tick().await; // Skip first immediate tick
        snapshot_timer.tick().await;

        loop {
            tokio::select! {
                _ = sweep_timer.tick() => {
                    let report = sweep(&coordinator, &config).await;
                    if report != SweepReport::default() {
                        info!(?report, "Maintenance sweep completed");
                    }
                }
                _ = snapshot_timer.tick() => {
                    if let Err(e) = coordinator.stats().snapshot().await {
                        warn!(error = %e, "Statistics snapshot failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Maintenance task shutting down");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::access::BanRequest;
    use crate::coordinator::LoginRequest;
    use crate::storage::{BanType, StateDatabase};
    use dwc_core::friend_code::LegacyCodec;
    use dwc_core::liveness::ManualClock;

    async fn coordinator() -> (Coordinator, Arc<ManualClock>) {
        let db = StateDatabase::open_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        (
            Coordinator::new(db, clock.clone(), Arc::new(LegacyCodec), false),
            clock,
        )
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_rows() {
        let (coordinator, clock) = coordinator().await;
        let config = MaintenanceConfig::default();

        let login = LoginRequest {
            user_id: "u1".into(),
            game_id: "ADAJ".into(),
            mac_address: "0009BF112233".into(),
            ip_address: "1.2.3.4".into(),
            ..LoginRequest::default()
        };
        let outcome = coordinator.login(&login).await.unwrap();
        coordinator.probe_nat(7, "1.2.3.4", 1000).await.unwrap();
        coordinator
            .access()
            .add_ban(&BanRequest {
                ban_type: BanType::Ip,
                identifier: "9.9.9.9",
                reason: "",
                banned_by: "admin",
                duration_secs: Some(60),
            })
            .await
            .unwrap();

        assert_eq!(sweep(&coordinator, &config).await, SweepReport::default());

        clock.advance(config.session_max_age_secs.max(config.natneg_max_age_secs));
        let report = sweep(&coordinator, &config).await;
        assert_eq!(report.sessions, 1);
        assert_eq!(report.natneg, 1);
        assert_eq!(report.bans, 1);
        assert!(coordinator.sessions().get(&outcome.session_key).await.is_err());
    }

    #[tokio::test]
    async fn loop_stops_on_shutdown() {
        let (coordinator, _clock) = coordinator().await;
        let (tx, rx) = watch::channel(false);
        let handle = spawn(coordinator, MaintenanceConfig::default(), rx);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
