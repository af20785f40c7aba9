//! Configuration resolution for the DWC coordinator.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/dwc/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (applied by the binary, highest priority)
//!
//! Liveness windows are protocol constants and live in
//! [`crate::liveness`], not here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub database_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: "info".to_string(),
        }
    }
}

/// Access-control policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AccessConfig {
    /// Only consoles present (and enabled) in the allow-list may log in.
    pub whitelist_mode: bool,
}

/// Background housekeeping. None of it is required for correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Interval between housekeeping passes (seconds).
    pub sweep_interval_secs: u64,
    /// Sessions older than this are deleted by the sweep (seconds).
    pub session_max_age_secs: i64,
    /// NAT cookies older than this are reaped (seconds).
    pub natneg_max_age_secs: i64,
    /// Game servers silent for longer than this are deleted (seconds).
    pub server_max_silence_secs: i64,
    /// Interval between statistics snapshots (seconds).
    pub snapshot_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
            session_max_age_secs: 30 * 60,
            natneg_max_age_secs: 10 * 60,
            server_max_silence_secs: 24 * 60 * 60,
            snapshot_interval_secs: 3600,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }
        let overlay = load_config_file(path)?;
        merge_config(&mut config, overlay);
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".dwc").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/dwc/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("dwc").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    if overlay.coordinator.database_path.is_some() {
        base.coordinator.database_path = overlay.coordinator.database_path;
    }
    base.coordinator.log_level = overlay.coordinator.log_level;
    base.access = overlay.access;
    base.maintenance = overlay.maintenance;
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("DWC_DATABASE_PATH") {
        config.coordinator.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("DWC_LOG_LEVEL") {
        config.coordinator.log_level = val;
    }
    if let Some(val) = var("DWC_WHITELIST_MODE") {
        if let Ok(flag) = val.parse() {
            config.access.whitelist_mode = flag;
        }
    }
    if let Some(val) = var("DWC_SESSION_SWEEP_SECS") {
        if let Ok(n) = val.parse() {
            config.maintenance.sweep_interval_secs = n;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_sweeps_at_session_window() {
        let config = Config::default();
        assert_eq!(config.maintenance.session_max_age_secs, 30 * 60);
        assert!(!config.access.whitelist_mode);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"access": {"whitelist_mode": true}}"#).unwrap();

        let config = load_config_file(&path).unwrap();
        assert!(config.access.whitelist_mode);
        assert_eq!(config.coordinator.log_level, "info");
        assert_eq!(config.maintenance.sweep_interval_secs, 300);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(load_config_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| match key {
            "DWC_DATABASE_PATH" => Some("/tmp/dwc.db".to_string()),
            "DWC_WHITELIST_MODE" => Some("true".to_string()),
            "DWC_SESSION_SWEEP_SECS" => Some("not-a-number".to_string()),
            _ => None,
        });

        assert_eq!(
            config.coordinator.database_path,
            Some(PathBuf::from("/tmp/dwc.db"))
        );
        assert!(config.access.whitelist_mode);
        assert_eq!(config.maintenance.sweep_interval_secs, 300);
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.json")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
