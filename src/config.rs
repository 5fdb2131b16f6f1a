use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Thresholds for the progress flush rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds before the known end of a track at which it counts as
    /// fully listened.
    #[serde(default = "default_end_margin")]
    pub end_margin_secs: u64,

    /// Position jump (seconds) between monitor ticks that forces a flush.
    #[serde(default = "default_delta_threshold")]
    pub delta_threshold_secs: u64,

    /// Minimum seconds between two jump-triggered flushes.
    #[serde(default = "default_delta_cooldown")]
    pub delta_cooldown_secs: u64,

    /// Seconds without any flush before a progress-only heartbeat goes out.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// How many rows the recently-played feed is asked for.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// How many podcasts the session cache keeps progress for.
    #[serde(default = "default_cached_podcasts")]
    pub cached_podcasts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the episode-status API.
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl SyncConfig {
    pub fn end_margin(&self) -> Duration {
        Duration::from_secs(self.end_margin_secs)
    }

    pub fn delta_threshold(&self) -> Duration {
        Duration::from_secs(self.delta_threshold_secs)
    }

    pub fn delta_cooldown(&self) -> Duration {
        Duration::from_secs(self.delta_cooldown_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            info!("no config file found, using defaults");
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("loading config from {path:?}");
        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        debug!("config saved to {path:?}");
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("podkids").join("player.toml"))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            end_margin_secs: default_end_margin(),
            delta_threshold_secs: default_delta_threshold(),
            delta_cooldown_secs: default_delta_cooldown(),
            heartbeat_secs: default_heartbeat(),
            recent_limit: default_recent_limit(),
            cached_podcasts: default_cached_podcasts(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

// Default value functions
fn default_end_margin() -> u64 {
    2
}
fn default_delta_threshold() -> u64 {
    15
}
fn default_delta_cooldown() -> u64 {
    5
}
fn default_heartbeat() -> u64 {
    30
}
fn default_recent_limit() -> usize {
    5
}
fn default_cached_podcasts() -> usize {
    32
}
fn default_timeout() -> u64 {
    10
}
