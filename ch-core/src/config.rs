//! Application configuration management.
//!
//! Handles loading, saving, and accessing client configuration: hub/API
//! endpoints and logging preferences. Configuration is persisted as TOML on
//! disk; the two endpoint values can additionally be supplied through the
//! `CLASSHUB_HUB_URL` and `CLASSHUB_API_BASE_URL` environment variables,
//! which take precedence over the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{HubError, HubResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hub/server connection settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hub/server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Explicit chat hub URL. When set, it is used as-is (modulo the
    /// loopback scheme downgrade applied at connect time).
    #[serde(default)]
    pub hub_url: Option<String>,

    /// Base REST API URL the hub URL is derived from when `hub_url` is not
    /// set (e.g. "https://lms.example.edu/api").
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses the default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output for the log file.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_api_base_url() -> String {
    constants::DEFAULT_API_BASE_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hub_url: None,
            api_base_url: default_api_base_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path, then apply
    /// environment overrides.
    pub fn load_default() -> HubResult<Self> {
        let path = Self::default_config_path()?;
        let mut config = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path. No environment
    /// overrides are applied.
    pub fn load_from_file(path: &Path) -> HubResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file path.
    pub fn save_default(&self) -> HubResult<()> {
        let path = Self::default_config_path()?;
        self.save_to_file(&path)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> HubResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| HubError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> HubResult<PathBuf> {
        let config_dir = Platform::config_dir()?;
        Ok(config_dir.join("config.toml"))
    }

    /// Overlay `CLASSHUB_HUB_URL` / `CLASSHUB_API_BASE_URL` onto the loaded
    /// values. Empty variables are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(hub_url) = std::env::var("CLASSHUB_HUB_URL") {
            let hub_url = Self::normalize_url(&hub_url);
            if !hub_url.is_empty() {
                self.server.hub_url = Some(hub_url);
            }
        }
        if let Ok(base) = std::env::var("CLASSHUB_API_BASE_URL") {
            let base = Self::normalize_url(&base);
            if !base.is_empty() {
                self.server.api_base_url = base;
            }
        }
    }

    /// Get the effective log directory, using the configured path or the
    /// default.
    pub fn effective_log_dir(&self) -> HubResult<PathBuf> {
        if self.logging.directory.is_empty() {
            let data_dir = Platform::data_dir()?;
            Ok(data_dir.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Normalize a URL from user-supplied configuration.
    ///
    /// Strips whitespace and stray quotes, ensures a scheme (https by
    /// default), and removes trailing slashes.
    pub fn normalize_url(url: &str) -> String {
        let trimmed = url.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}
