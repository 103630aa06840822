//! Client configuration.

use anyhow::Result;
use atlas_core::{SessionConfig, DEFAULT_GREETING, DEFAULT_WS_PATH};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Origin of the dashboard serving the assistant socket
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_origin() -> String {
    "http://localhost:8000".to_string()
}

fn default_ws_path() -> String {
    DEFAULT_WS_PATH.to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            ws_path: default_ws_path(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            greeting: default_greeting(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `config/default.toml`, then the user config dir, else defaults.
    pub fn load() -> Result<Self> {
        let local = PathBuf::from("config/default.toml");
        if local.exists() {
            return Self::load_from(&local);
        }

        if let Some(user) = dirs::config_dir().map(|dir| dir.join("atlas").join("config.toml")) {
            if user.exists() {
                return Self::load_from(&user);
            }
        }

        Ok(Config::default())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            origin: self.origin.clone(),
            ws_path: self.ws_path.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            greeting: self.greeting.clone(),
        }
    }
}
