use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::app::{APP_ID, CONFIG_FILE};
use crate::error::ConfigError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

/// Shell configuration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    /// Base URL of the card verification backend
    pub backend_url: String,

    /// Front-end liveness check period
    pub session_check_interval_secs: u64,

    /// Host-side re-verification period
    pub host_monitor_interval_secs: u64,

    /// HTTP request timeout
    pub http_timeout_secs: u64,

    /// Explicit location of the user data document.
    /// Defaults to the per-OS application data directory.
    pub data_file: Option<PathBuf>,

    /// Max tracing level ("error", "warn", "info", "debug", "trace")
    pub log_level: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            session_check_interval_secs: 60,
            host_monitor_interval_secs: 10,
            http_timeout_secs: 30,
            data_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl ShellConfig {
    /// Load configuration from file, then apply environment overrides
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Ok(config_path) = Self::config_path() {
            if config_path.exists() {
                match Self::read_from(&config_path) {
                    Ok(loaded) => {
                        info!("Loaded config from {:?}", config_path);
                        config = loaded;
                    }
                    Err(e) => warn!("Ignoring config at {:?}: {}", config_path, e),
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn read_from(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Environment wins over the config file
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("BACKEND_URL").filter(|v| !v.trim().is_empty()) {
            self.backend_url = url;
        }
        if let Some(level) = var("KEYGATE_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            self.log_level = level;
        }
        if let Some(path) = var("KEYGATE_DATA_FILE").filter(|v| !v.trim().is_empty()) {
            self.data_file = Some(PathBuf::from(path));
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(APP_ID).join(CONFIG_FILE))
    }

    pub fn backend_url(&self) -> &str {
        let trimmed = self.backend_url.trim_end_matches('/');
        if trimmed.is_empty() {
            DEFAULT_BACKEND_URL
        } else {
            trimmed
        }
    }

    pub fn session_check_interval(&self) -> Duration {
        Duration::from_secs(self.session_check_interval_secs.max(1))
    }

    pub fn host_monitor_interval(&self) -> Duration {
        Duration::from_secs(self.host_monitor_interval_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    }
}
