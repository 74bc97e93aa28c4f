//! Session configuration for the Sandbar client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

pub(crate) const CONFIG_FILES: &[&str] = &["sandbar.toml", ".sandbar.toml"];

/// Session configuration loaded from `sandbar.toml`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Config file path (if found).
    pub config_path: Option<PathBuf>,
    /// Suppress "user joined/left" presence toasts.
    pub hide_presence_notifications: bool,
    /// How long a live outage may last before the reconnecting toast shows.
    pub reconnect_notice_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            hide_presence_notifications: false,
            reconnect_notice_delay: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    /// Loads configuration from a root directory, falling back to defaults
    /// when no config file exists or it cannot be read.
    pub fn load(root: &Path) -> Self {
        let Some(path) = find_config_file(root) else {
            return SessionConfig::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            warn!("Failed to read sandbar config at {}", path.display());
            return SessionConfig::default();
        };
        SessionConfig::from_contents(Some(path), &contents)
    }

    /// Parses configuration from file contents, warning and defaulting on
    /// parse failure.
    pub fn from_contents(config_path: Option<PathBuf>, contents: &str) -> Self {
        let parsed: ConfigFile = match toml::from_str(contents) {
            Ok(parsed) => parsed,
            Err(err) => {
                if let Some(path) = &config_path {
                    warn!("Failed to parse sandbar config at {}: {err}", path.display());
                } else {
                    warn!("Failed to parse sandbar config: {err}");
                }
                return SessionConfig {
                    config_path,
                    ..SessionConfig::default()
                };
            }
        };

        SessionConfig {
            config_path,
            hide_presence_notifications: parsed.live.hide_presence_notifications,
            reconnect_notice_delay: Duration::from_millis(parsed.live.reconnect_notice_delay_ms),
        }
    }
}

fn find_config_file(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|candidate| candidate.is_file())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    live: LiveSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LiveSection {
    hide_presence_notifications: bool,
    reconnect_notice_delay_ms: u64,
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            hide_presence_notifications: false,
            reconnect_notice_delay_ms: 2_000,
        }
    }
}
