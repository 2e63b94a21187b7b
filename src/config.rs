//! Service configuration: loaded from /etc/pulse-recovery/config.toml
//!
//! Every field has a default so a missing or partial file still yields a
//! usable configuration. CLI flags override file values in `main`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::recovery::PageLimits;
use crate::store::StoreSettings;

pub const DEFAULT_CONFIG_FILE: &str = "/etc/pulse-recovery/config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_data_file")]
    pub data_file: String,

    // ── Retention ──
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,        // 0 disables pruning
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,

    // ── Request bounds ──
    #[serde(default = "default_max_ingest")]
    pub max_ingest_points: usize,
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,

    /// Base URL the `--report` client talks to
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_data_file() -> String { "/var/lib/pulse-recovery/recovery.json".to_string() }
fn default_retention_days() -> i64 { 90 }
fn default_prune_interval() -> u64 { 3600 }
fn default_max_ingest() -> usize { 2000 }
fn default_limit() -> i64 { 100 }
fn default_max_limit() -> i64 { 500 }
fn default_api_base() -> String { "http://127.0.0.1:7655".to_string() }

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            retention_days: default_retention_days(),
            prune_interval_secs: default_prune_interval(),
            max_ingest_points: default_max_ingest(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            api_base: default_api_base(),
        }
    }
}

impl RecoveryConfig {
    /// Parse a TOML document, rejecting nonsensical bounds
    pub fn from_toml(raw: &str) -> Result<Self, String> {
        let mut config: RecoveryConfig = toml::from_str(raw)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        if config.default_limit <= 0 {
            return Err("default_limit must be positive".to_string());
        }
        if config.max_limit < config.default_limit {
            return Err(format!(
                "max_limit ({}) must be at least default_limit ({})",
                config.max_limit, config.default_limit
            ));
        }
        if config.max_ingest_points == 0 {
            config.max_ingest_points = default_max_ingest();
        }
        Ok(config)
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits { default_limit: self.default_limit, max_limit: self.max_limit }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            retention: chrono::Duration::days(self.retention_days.max(0)),
            prune_interval: chrono::Duration::seconds(self.prune_interval_secs.max(1) as i64),
            limits: self.page_limits(),
        }
    }
}

/// Load configuration from disk, falling back to defaults when the file is
/// missing or invalid
pub fn load_config(path: &Path) -> RecoveryConfig {
    match std::fs::read_to_string(path) {
        Ok(raw) => match RecoveryConfig::from_toml(&raw) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{} ({}), using defaults", e, path.display());
                RecoveryConfig::default()
            }
        },
        Err(_) => {
            info!("No config at {}, using defaults", path.display());
            RecoveryConfig::default()
        }
    }
}

/// Write configuration as TOML
pub fn save_config(path: &Path, config: &RecoveryConfig) -> Result<(), String> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create config dir: {}", e))?;
    }
    let raw = toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, raw).map_err(|e| format!("Failed to write config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = RecoveryConfig::from_toml("retention_days = 30\nmax_limit = 250\n").unwrap();
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.max_limit, 250);
        assert_eq!(config.default_limit, 100);
        assert_eq!(config.data_file, "/var/lib/pulse-recovery/recovery.json");
    }

    #[test]
    fn test_rejects_inverted_limits() {
        let err = RecoveryConfig::from_toml("default_limit = 200\nmax_limit = 50\n").unwrap_err();
        assert!(err.contains("max_limit"));
        assert!(RecoveryConfig::from_toml("default_limit = 0\n").is_err());
    }

    #[test]
    fn test_store_settings_conversion() {
        let config = RecoveryConfig { retention_days: -4, prune_interval_secs: 0, ..Default::default() };
        let settings = config.store_settings();
        assert_eq!(settings.retention, chrono::Duration::zero());
        assert_eq!(settings.prune_interval, chrono::Duration::seconds(1));
        assert_eq!(settings.limits, PageLimits::default());
    }

    #[test]
    fn test_load_missing_and_invalid_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(load_config(&path), RecoveryConfig::default());

        std::fs::write(&path, "retention_days = \"soon\"").unwrap();
        assert_eq!(load_config(&path), RecoveryConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etc").join("config.toml");
        let config = RecoveryConfig { retention_days: 14, api_base: "http://backup:7655".into(), ..Default::default() };
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path), config);
    }
}
