//! Persistent application configuration model and defaults.

use std::path::Path;

use log::{info, warn};

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Outbound lookup timeouts.
    pub network: NetworkConfig,
    #[serde(default)]
    /// Playback progress polling behavior.
    pub playback: PlaybackConfig,
}

/// Timeouts applied to the metadata lookup client.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Overall per-request bound; a lookup never outlives this.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Position-display polling preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_progress_poll_interval_ms")]
    pub progress_poll_interval_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_progress_poll_interval_ms() -> u64 {
    500
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_poll_interval_ms: default_progress_poll_interval_ms(),
        }
    }
}

/// Clamps configured values into workable ranges.
pub fn sanitize_config(config: Config) -> Config {
    let clamped_connect = config.network.connect_timeout_ms.clamp(500, 60_000);
    let clamped_request = config.network.request_timeout_ms.clamp(1_000, 120_000);
    let clamped_poll = config.playback.progress_poll_interval_ms.clamp(100, 10_000);

    Config {
        network: NetworkConfig {
            connect_timeout_ms: clamped_connect,
            request_timeout_ms: clamped_request,
        },
        playback: PlaybackConfig {
            progress_poll_interval_ms: clamped_poll,
        },
    }
}

/// Loads the config file, creating it with defaults on first run.
///
/// Unreadable or malformed files fall back to defaults; the running
/// application must never be blocked by a broken preference file.
pub fn load_or_create(path: &Path) -> Config {
    if !path.exists() {
        let default_config = Config::default();
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        match toml::to_string(&default_config) {
            Ok(config_text) => {
                if let Err(err) = std::fs::write(path, config_text) {
                    warn!(
                        "Failed to write default config to {}: {}",
                        path.display(),
                        err
                    );
                }
            }
            Err(err) => warn!("Failed to serialize default config: {}", err),
        }
        return default_config;
    }

    let config_content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Failed to read config from {}: {}. Using defaults.",
                path.display(),
                err
            );
            return Config::default();
        }
    };

    sanitize_config(toml::from_str::<Config>(&config_content).unwrap_or_default())
}
