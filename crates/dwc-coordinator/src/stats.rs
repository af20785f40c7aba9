//! Server statistics snapshots and the live overview.

use std::sync::Arc;

use dwc_core::liveness::{Clock, LivenessWindow, utc_day_start};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::storage::{ServerStatistic, StateDatabase, StatisticCounts};

const TOP_GAMES: u32 = 5;
const DAY_SECS: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformCount {
    pub platform: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameCount {
    pub game_id: String,
    pub profiles: i64,
}

/// Live totals computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub total_consoles: i64,
    pub total_profiles: i64,
    pub active_bans: i64,
    pub online_consoles: i64,
    pub online_servers: i64,
    pub recent_logins: i64,
    pub logins_today: i64,
    pub consoles_by_platform: Vec<PlatformCount>,
    pub top_games: Vec<GameCount>,
}

#[derive(Clone)]
pub struct StatisticsRecorder {
    db: StateDatabase,
    clock: Arc<dyn Clock>,
}

impl StatisticsRecorder {
    pub fn new(db: StateDatabase, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Append a snapshot of current activity.
    pub async fn snapshot(&self) -> Result<ServerStatistic> {
        let now = self.clock.now();
        let counts = StatisticCounts {
            active_consoles: self
                .db
                .count_consoles(Some(LivenessWindow::ONLINE.cutoff(now)))
                .await?,
            active_profiles: self
                .db
                .count_profiles_with_sessions_since(LivenessWindow::SESSION_ACTIVE.cutoff(now))
                .await?,
            active_servers: self
                .db
                .count_game_servers_since(LivenessWindow::HEARTBEAT.cutoff(now))
                .await?,
            total_logins_today: self.db.count_nas_logins_since(utc_day_start(now)).await?,
        };

        let stat = self.db.insert_statistic(&counts, now).await?;
        info!(
            active_consoles = stat.active_consoles,
            active_profiles = stat.active_profiles,
            active_servers = stat.active_servers,
            logins_today = stat.total_logins_today,
            "Statistics snapshot recorded"
        );
        Ok(stat)
    }

    pub async fn latest(&self) -> Result<ServerStatistic> {
        Ok(self.db.latest_statistic().await?)
    }

    /// Snapshots from the last `days` days, newest first.
    pub async fn history(&self, days: u32) -> Result<Vec<ServerStatistic>> {
        let since = self.clock.now() - i64::from(days) * DAY_SECS;
        Ok(self.db.list_statistics_since(since).await?)
    }

    pub async fn overview(&self) -> Result<Overview> {
        let now = self.clock.now();
        let online_cutoff = LivenessWindow::ONLINE.cutoff(now);

        let consoles_by_platform = self
            .db
            .count_consoles_by_platform()
            .await?
            .into_iter()
            .map(|(platform, count)| PlatformCount { platform, count })
            .collect();
        let top_games = self
            .db
            .top_games(TOP_GAMES)
            .await?
            .into_iter()
            .map(|(game_id, profiles)| GameCount { game_id, profiles })
            .collect();

        Ok(Overview {
            total_consoles: self.db.count_consoles(None).await?,
            total_profiles: self.db.count_profiles().await?,
            active_bans: self.db.count_active_bans(now).await?,
            online_consoles: self.db.count_consoles(Some(online_cutoff)).await?,
            online_servers: self.db.count_game_servers_since(online_cutoff).await?,
            recent_logins: self
                .db
                .count_nas_logins_since(LivenessWindow::RECENT.cutoff(now) + 1)
                .await?,
            logins_today: self.db.count_nas_logins_since(utc_day_start(now)).await?,
            consoles_by_platform,
            top_games,
        })
    }
}
