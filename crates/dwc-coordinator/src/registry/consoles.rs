//! Console registry keyed by MAC address.

use std::sync::Arc;

use dwc_core::liveness::{Clock, LivenessWindow, Presence};
use tracing::{debug, info};

use crate::error::{CoordinatorError, Result};
use crate::storage::{Console, ConsoleParams, Platform, StateDatabase};

/// Attributes recorded when a console first contacts the coordinator.
#[derive(Debug, Clone, Default)]
pub struct ConsoleAttrs {
    pub user_id: String,
    pub device_name: String,
    pub platform: Platform,
}

/// Normalise a MAC address to lowercase colon-separated form.
///
/// Accepts bare hex or `:`, `-` and `.` separators in any case.
pub fn normalize_mac(input: &str) -> Result<String> {
    let hex: String = input
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoordinatorError::InvalidFormat(format!("MAC address {input}")));
    }

    let lower = hex.to_ascii_lowercase();
    let octets: Vec<&str> = (0..6).map(|i| &lower[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}

/// Tracks consoles and their last contact time.
#[derive(Clone)]
pub struct ConsoleRegistry {
    db: StateDatabase,
    clock: Arc<dyn Clock>,
}

impl ConsoleRegistry {
    pub fn new(db: StateDatabase, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Record a contact from `mac`: create the console on first contact,
    /// otherwise refresh its last-seen time.
    pub async fn get_or_create(&self, mac: &str, attrs: &ConsoleAttrs) -> Result<Console> {
        let mac_address = normalize_mac(mac)?;
        let now = self.clock.now();
        let params = ConsoleParams {
            mac_address: &mac_address,
            user_id: &attrs.user_id,
            device_name: &attrs.device_name,
            platform: attrs.platform,
        };
        let (console, created) = self.db.upsert_console(&params, now).await?;

        if created {
            info!(mac = %console.mac_address, platform = %console.platform, "Console registered");
        } else {
            debug!(mac = %console.mac_address, "Console seen");
        }
        Ok(console)
    }

    pub async fn lookup(&self, mac: &str) -> Result<Console> {
        let mac_address = normalize_mac(mac)?;
        Ok(self.db.get_console(&mac_address).await?)
    }

    pub async fn lookup_by_id(&self, id: i64) -> Result<Console> {
        Ok(self.db.get_console_by_id(id).await?)
    }

    /// Unknown consoles are not enabled.
    pub async fn is_enabled(&self, mac: &str) -> Result<bool> {
        match self.lookup(mac).await {
            Ok(console) => Ok(console.enabled),
            Err(CoordinatorError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns `false` if the console is unknown.
    pub async fn set_enabled(&self, mac: &str, enabled: bool) -> Result<bool> {
        let mac_address = normalize_mac(mac)?;
        let updated = self.db.set_console_enabled(&mac_address, enabled).await?;
        if updated {
            info!(mac = %mac_address, enabled, "Console enabled flag changed");
        }
        Ok(updated)
    }

    pub fn presence(&self, console: &Console) -> Presence {
        console.presence(self.clock.now())
    }

    /// Consoles seen within the online window, most recent first.
    pub async fn list_online(&self) -> Result<Vec<Console>> {
        let cutoff = LivenessWindow::ONLINE.cutoff(self.clock.now());
        Ok(self.db.list_consoles_seen_since(cutoff).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dwc_core::liveness::ManualClock;

    const T0: i64 = 1_700_000_000;

    async fn registry() -> (ConsoleRegistry, Arc<ManualClock>) {
        let db = StateDatabase::open_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(T0));
        (ConsoleRegistry::new(db, clock.clone()), clock)
    }

    fn wii() -> ConsoleAttrs {
        ConsoleAttrs {
            user_id: "4012345".into(),
            device_name: "living room".into(),
            platform: Platform::Wii,
        }
    }

    #[test]
    fn mac_forms_normalise_to_colon_lowercase() {
        assert_eq!(normalize_mac("0009BF112233").unwrap(), "00:09:bf:11:22:33");
        assert_eq!(normalize_mac("00-09-BF-11-22-33").unwrap(), "00:09:bf:11:22:33");
        assert_eq!(normalize_mac("0009.bf11.2233").unwrap(), "00:09:bf:11:22:33");
        assert!(matches!(
            normalize_mac("00:09:bf:11:22"),
            Err(CoordinatorError::InvalidFormat(_))
        ));
        assert!(normalize_mac("zz:09:bf:11:22:33").is_err());
    }

    #[tokio::test]
    async fn repeat_contact_refreshes_last_seen() {
        let (registry, clock) = registry().await;
        let first = registry.get_or_create("0009BF112233", &wii()).await.unwrap();
        clock.advance(90);
        let second = registry.get_or_create("00:09:bf:11:22:33", &wii()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(registry.lookup_by_id(first.id).await.unwrap().last_seen, T0 + 90);
        assert_eq!(second.registered_at, T0);
        assert_eq!(second.last_seen, T0 + 90);
    }

    #[tokio::test]
    async fn presence_ages_out() {
        let (registry, clock) = registry().await;
        let console = registry.get_or_create("0009BF112233", &wii()).await.unwrap();

        assert_eq!(registry.presence(&console), Presence::Online);
        assert_eq!(registry.list_online().await.unwrap().len(), 1);

        clock.advance(LivenessWindow::ONLINE.as_secs());
        assert_eq!(registry.presence(&console), Presence::Recent);
        assert!(registry.list_online().await.unwrap().is_empty());

        clock.advance(LivenessWindow::RECENT.as_secs());
        assert_eq!(registry.presence(&console), Presence::Offline);
    }

    #[tokio::test]
    async fn enable_flag_and_unknown_consoles() {
        let (registry, _clock) = registry().await;
        assert!(!registry.is_enabled("0009BF112233").await.unwrap());
        assert!(!registry.set_enabled("0009BF112233", true).await.unwrap());

        registry.get_or_create("0009BF112233", &wii()).await.unwrap();
        assert!(registry.is_enabled("0009BF112233").await.unwrap());
        assert!(registry.set_enabled("0009bf112233", false).await.unwrap());
        assert!(!registry.is_enabled("0009BF112233").await.unwrap());
        assert!(matches!(
            registry.lookup("0009BF112234").await,
            Err(CoordinatorError::NotFound(_))
        ));
    }
}
