//! Configuration resolution for npscan.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`$XDG_CONFIG_HOME/npscan/settings.json`) or an explicit
//!    `--config` file
//! 3. Environment variables (`NPSCAN_*`)
//! 4. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete npscan configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// How snapshot payloads are written to the match store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotEncoding {
    Json,
    #[default]
    Lz4,
}

impl SnapshotEncoding {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Lz4 => "lz4",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "json" => Some(Self::Json),
            "lz4" => Some(Self::Lz4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
    pub notifications_database_path: Option<PathBuf>,
    pub snapshot_encoding: SnapshotEncoding,
}

impl StorageConfig {
    /// Resolved match database path (`~/.npscan/np.db` unless overridden).
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| data_dir().join("np.db"))
    }

    /// Resolved notification database path.
    pub fn notifications_database_path(&self) -> PathBuf {
        self.notifications_database_path
            .clone()
            .unwrap_or_else(|| data_dir().join("np-notifications.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollingConfig {
    /// Background poll period for `serve`.
    pub period_secs: u64,
    /// A credential polled more recently than this is skipped.
    pub min_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            period_secs: 5 * 60,
            min_interval_secs: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    pub discord_webhook_url: Option<String>,
    /// Delay after every delivered notification.
    pub pacing_millis: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            discord_webhook_url: None,
            pacing_millis: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 38080)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://np.ironhelmet.com/api".to_string(),
            user_agent: format!("npscan/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Load configuration with hierarchical resolution.
///
/// An explicit path must exist; the global file is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(path) = explicit {
        let file = load_config_file(path)?;
        merge_config(&mut config, file);
    } else if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("npscan").join("settings.json"))
}

/// Directory holding the default databases (`~/.npscan`).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".npscan")
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
    if overlay.storage.database_path.is_some() {
        base.storage.database_path = overlay.storage.database_path;
    }
    if overlay.storage.notifications_database_path.is_some() {
        base.storage.notifications_database_path = overlay.storage.notifications_database_path;
    }
    base.storage.snapshot_encoding = overlay.storage.snapshot_encoding;

    base.polling = overlay.polling;

    if overlay.notifications.discord_webhook_url.is_some() {
        base.notifications.discord_webhook_url = overlay.notifications.discord_webhook_url;
    }
    base.notifications.pacing_millis = overlay.notifications.pacing_millis;

    base.server = overlay.server;
    base.api = overlay.api;
    base.log_level = overlay.log_level;
}

fn parse_env<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.parse()
        .map_err(|_| Error::Config(format!("Invalid value for {key}: {val:?}")))
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(val) = var("NPSCAN_DB_PATH") {
        config.storage.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("NPSCAN_NOTIFICATIONS_DB_PATH") {
        config.storage.notifications_database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("NPSCAN_SNAPSHOT_ENCODING") {
        config.storage.snapshot_encoding = SnapshotEncoding::parse(&val).ok_or_else(|| {
            Error::Config(format!("Invalid value for NPSCAN_SNAPSHOT_ENCODING: {val:?}"))
        })?;
    }
    if let Some(val) = var("NPSCAN_DISCORD_WEBHOOK_URL") {
        config.notifications.discord_webhook_url = Some(val);
    }
    if let Some(val) = var("NPSCAN_POLL_PERIOD_SECS") {
        config.polling.period_secs = parse_env("NPSCAN_POLL_PERIOD_SECS", &val)?;
    }
    if let Some(val) = var("NPSCAN_MIN_POLL_INTERVAL_SECS") {
        config.polling.min_interval_secs = parse_env("NPSCAN_MIN_POLL_INTERVAL_SECS", &val)?;
    }
    if let Some(val) = var("NPSCAN_ADDR") {
        config.server.addr = parse_env("NPSCAN_ADDR", &val)?;
    }
    if let Some(val) = var("NPSCAN_API_BASE_URL") {
        config.api.base_url = val;
    }
    if let Some(val) = var("NPSCAN_LOG_LEVEL") {
        config.log_level = val;
    }
    Ok(())
}
