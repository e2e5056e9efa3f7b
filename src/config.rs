use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::repository::DEFAULT_RETENTION_DAYS;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 15;
/// Largest accepted `sync.retention_days`, about a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Remote API endpoint and credentials
#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub base_url: ConfigValue<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ConfigValue<String>>,
}

impl ApiConfig {
    pub fn api_key(&self) -> &str {
        self.api_key.as_ref().map(|k| k.value.as_str()).unwrap_or("")
    }
}

/// Background sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minutes between periodic sync runs
    pub interval_minutes: u64,
    /// Days of sensor readings kept in the cache
    pub retention_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1).saturating_mul(60))
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite cache
    pub database_path: ConfigValue<PathBuf>,
    /// Path to the saved login session
    pub session_path: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub api: ApiConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ApiFile {
    base_url: Option<String>,
    api_key: Option<String>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    session_path: Option<PathBuf>,
    api: Option<ApiFile>,
    sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = Self::default_data_dir();
        let mut database_path =
            ConfigValue::new(data_dir.join("farmstead.db"), ConfigSource::Default);
        let mut session_path =
            ConfigValue::new(data_dir.join("session.json"), ConfigSource::Default);
        let mut base_url = ConfigValue::new(DEFAULT_API_URL.to_string(), ConfigSource::Default);
        let mut api_key = None;
        let mut config_file = None;
        let mut sync = SyncConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                database_path = ConfigValue::new(resolve(&path, db_path), ConfigSource::File);
            }
            if let Some(session) = file_config.session_path {
                session_path = ConfigValue::new(resolve(&path, session), ConfigSource::File);
            }
            if let Some(api) = file_config.api {
                if let Some(url) = api.base_url {
                    base_url = ConfigValue::new(url, ConfigSource::File);
                }
                if let Some(key) = api.api_key {
                    api_key = Some(ConfigValue::new(key, ConfigSource::File));
                }
            }
            if let Some(sync_config) = file_config.sync {
                if !(0..=MAX_RETENTION_DAYS).contains(&sync_config.retention_days) {
                    return Err(ConfigError::InvalidValue(
                        path.clone(),
                        format!(
                            "sync.retention_days must be between 0 and {}, got {}",
                            MAX_RETENTION_DAYS, sync_config.retention_days
                        ),
                    ));
                }
                sync = sync_config;
            }
        }

        if let Ok(db_path) = std::env::var("FARM_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(session) = std::env::var("FARM_SESSION_PATH") {
            session_path = ConfigValue::new(PathBuf::from(session), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("FARM_API_URL") {
            base_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(key) = std::env::var("FARM_API_KEY") {
            api_key = Some(ConfigValue::new(key, ConfigSource::Environment));
        }

        Ok(Self {
            database_path,
            session_path,
            config_file,
            api: ApiConfig { base_url, api_key },
            sync,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/farmstead/
    /// - macOS: ~/Library/Application Support/farmstead/
    /// - Windows: %APPDATA%/farmstead/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("farmstead")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/farmstead/
    /// - macOS: ~/Library/Application Support/farmstead/
    /// - Windows: %APPDATA%/farmstead/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("farmstead")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

// Relative paths in the file are relative to the file's directory.
fn resolve(config_path: &Path, value: PathBuf) -> PathBuf {
    if value.is_relative() {
        config_path
            .parent()
            .map(|p| p.join(&value))
            .unwrap_or(value)
    } else {
        value
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(PathBuf, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(path, msg) => {
                write!(f, "Invalid value in config file '{}': {}", path.display(), msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
