//! Liveness clock and the fixed time windows used to classify entities.
//!
//! Nothing in the coordinator stores an "online" or "active" flag. Every
//! such answer is derived at read time from a stored timestamp and one of
//! the windows below, so a silent client simply ages out.
//!
//! A window `w` contains a timestamp `t` at time `now` iff `now - t < w`:
//! the boundary itself is already outside.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::db::unix_timestamp;

/// Source of "now" for every liveness decision.
pub trait Clock: Send + Sync {
    /// Current time as Unix seconds.
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        unix_timestamp()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub const fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs` seconds.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A half-open time window measured backwards from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessWindow {
    secs: i64,
}

impl LivenessWindow {
    /// Console or server shown as online (last seen within 5 minutes).
    pub const ONLINE: Self = Self::minutes(5);
    /// Recently active (within 60 minutes).
    pub const RECENT: Self = Self::minutes(60);
    /// Session active (within 30 minutes of login).
    pub const SESSION_ACTIVE: Self = Self::minutes(30);
    /// Game server heartbeat timeout (2 minutes).
    pub const HEARTBEAT: Self = Self::minutes(2);

    pub const fn from_secs(secs: i64) -> Self {
        Self { secs }
    }

    pub const fn minutes(minutes: i64) -> Self {
        Self { secs: minutes * 60 }
    }

    pub const fn as_secs(self) -> i64 {
        self.secs
    }

    /// Whether `timestamp` is still inside the window at `now`.
    pub const fn contains(self, timestamp: i64, now: i64) -> bool {
        now - timestamp < self.secs
    }

    /// Oldest timestamp excluded by the window; rows strictly newer than the
    /// cutoff are inside (`t > cutoff` is the same test as `contains`).
    pub const fn cutoff(self, now: i64) -> i64 {
        now - self.secs
    }
}

/// Display classification of a console by its `last_seen` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Recent,
    Offline,
}

impl Presence {
    pub const fn classify(last_seen: i64, now: i64) -> Self {
        if LivenessWindow::ONLINE.contains(last_seen, now) {
            Self::Online
        } else if LivenessWindow::RECENT.contains(last_seen, now) {
            Self::Recent
        } else {
            Self::Offline
        }
    }
}

/// Start of the UTC day containing `now`.
pub const fn utc_day_start(now: i64) -> i64 {
    now - now.rem_euclid(86_400)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_constants() {
        assert_eq!(LivenessWindow::ONLINE.as_secs(), 300);
        assert_eq!(LivenessWindow::RECENT.as_secs(), 3600);
        assert_eq!(LivenessWindow::SESSION_ACTIVE.as_secs(), 1800);
        assert_eq!(LivenessWindow::HEARTBEAT.as_secs(), 120);
    }

    #[test]
    fn boundary_is_outside() {
        let w = LivenessWindow::SESSION_ACTIVE;
        assert!(w.contains(1000, 1000 + 29 * 60 + 59));
        assert!(!w.contains(1000, 1000 + 30 * 60));
    }

    #[test]
    fn cutoff_agrees_with_contains() {
        let w = LivenessWindow::HEARTBEAT;
        let now = 10_000;
        for t in [now - 121, now - 120, now - 119, now] {
            assert_eq!(t > w.cutoff(now), w.contains(t, now), "t = {t}");
        }
    }

    #[test]
    fn presence_classification() {
        let now = 100_000;
        assert_eq!(Presence::classify(now - 10, now), Presence::Online);
        assert_eq!(Presence::classify(now - 300, now), Presence::Recent);
        assert_eq!(Presence::classify(now - 3599, now), Presence::Recent);
        assert_eq!(Presence::classify(now - 3600, now), Presence::Offline);
    }

    #[test]
    fn manual_clock_moves() {
        let clock = ManualClock::new(50);
        clock.advance(10);
        assert_eq!(clock.now(), 60);
        clock.set(5);
        assert_eq!(clock.now(), 5);
    }

    #[test]
    fn day_start() {
        // 2024-01-02T03:04:05Z
        let ts = 1_704_164_645;
        assert_eq!(utc_day_start(ts), 1_704_153_600);
    }
}
