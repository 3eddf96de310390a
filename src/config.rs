//! Configuration management for lminet

use crate::error::{NetworkError, NetworkResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/lminet/lminet.toml";

/// Main lminet configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Job defaults
    #[serde(default)]
    pub jobs: JobSettings,
    /// Backend connection settings
    #[serde(default)]
    pub backend: BackendSettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Whether finished jobs are removed after the retention window
    #[serde(default = "default_delete_on_completion")]
    pub delete_on_completion: bool,
    /// Retention window of finished jobs (seconds)
    #[serde(default = "default_time_before_removal")]
    pub time_before_removal_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// How long `Network::start` waits for the initial enumeration (seconds)
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

fn default_delete_on_completion() -> bool {
    true
}

fn default_time_before_removal() -> u64 {
    300
}

fn default_startup_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            delete_on_completion: default_delete_on_completion(),
            time_before_removal_secs: default_time_before_removal(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl JobSettings {
    pub fn time_before_removal(&self) -> Duration {
        Duration::from_secs(self.time_before_removal_secs)
    }
}

impl BackendSettings {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl NetworkConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> NetworkResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NetworkError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| NetworkError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from `path`, or defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> NetworkResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> NetworkResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NetworkError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), content)
            .map_err(|e| NetworkError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}
