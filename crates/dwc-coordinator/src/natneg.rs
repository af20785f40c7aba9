//! NAT negotiation cookie tracker.
//!
//! A cookie maps to exactly one client endpoint; the last registration wins.
//! Cookie structure is not validated.

use std::sync::Arc;

use dwc_core::liveness::{Clock, LivenessWindow};
use tracing::{debug, info};

use crate::error::Result;
use crate::storage::{NatNeg, StateDatabase};

#[derive(Clone)]
pub struct NatNegotiationTracker {
    db: StateDatabase,
    clock: Arc<dyn Clock>,
}

/// Cookies are unsigned 64-bit on the wire; storage keeps the same bits as
/// a signed integer.
const fn cookie_key(cookie: u64) -> i64 {
    i64::from_ne_bytes(cookie.to_ne_bytes())
}

impl NatNegotiationTracker {
    pub fn new(db: StateDatabase, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Map `cookie` to an endpoint, replacing any previous mapping.
    pub async fn register(&self, cookie: u64, addr: &str, port: u16) -> Result<NatNeg> {
        let natneg = self
            .db
            .upsert_natneg(cookie_key(cookie), addr, port, self.clock.now())
            .await?;
        debug!(cookie, addr = %addr, port, "NAT cookie registered");
        Ok(natneg)
    }

    pub async fn resolve(&self, cookie: u64) -> Result<NatNeg> {
        Ok(self.db.get_natneg(cookie_key(cookie)).await?)
    }

    pub async fn release(&self, cookie: u64) -> Result<bool> {
        Ok(self.db.delete_natneg(cookie_key(cookie)).await?)
    }

    /// Drop mappings registered `max_age_secs` or more ago.
    pub async fn reap_older_than(&self, max_age_secs: i64) -> Result<u64> {
        let cutoff = LivenessWindow::from_secs(max_age_secs).cutoff(self.clock.now());
        let reaped = self.db.delete_natneg_before(cutoff).await?;
        if reaped > 0 {
            info!(reaped, "Reaped NAT cookies");
        }
        Ok(reaped)
    }
}
