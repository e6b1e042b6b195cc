//! Player configuration.
//!
//! Settings come from an optional TOML file overlaid by `CAMPAIGN_PLAYER__*`
//! environment variables. Every field has a default so an empty config is a
//! working kiosk pointed at a local backend.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "campaign-player.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the campaign backend.
    pub server_url: String,
    pub playback: PlaybackSettings,
    pub status: StatusSettings,
    pub display: DisplaySettings,
    pub device: DeviceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".into(),
            playback: PlaybackSettings::default(),
            status: StatusSettings::default(),
            display: DisplaySettings::default(),
            device: DeviceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Automatic retries per load before the loop goes idle.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Delay between a successful play and the metadata refresh.
    pub info_refresh_delay_ms: u64,
    /// Delay between end-of-stream and loading the next item.
    pub ended_delay_ms: u64,
    /// Where media payloads are spooled while displayed.
    pub spool_dir: PathBuf,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 2000,
            info_refresh_delay_ms: 500,
            ended_delay_ms: 1000,
            spool_dir: std::env::temp_dir().join("campaign-player"),
        }
    }
}

impl PlaybackSettings {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn info_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.info_refresh_delay_ms)
    }

    pub fn ended_delay(&self) -> Duration {
        Duration::from_millis(self.ended_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    pub poll_interval_secs: u64,
    pub notification_ttl_secs: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            notification_ttl_secs: 5,
        }
    }
}

impl StatusSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// TrueType font used for the overlay (window frontend only).
    pub font_path: PathBuf,
    pub font_size: u16,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
            font_size: 22,
        }
    }
}

/// Values used by `setup` when not given on the command line.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub name: Option<String>,
    pub location_id: Option<i64>,
    pub stream_type: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: None,
            location_id: None,
            stream_type: "video".into(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (optional) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path.to_path_buf()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("CAMPAIGN_PLAYER").separator("__"))
            .build()?
            .try_deserialize()
    }
}
