use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::ConflictStrategy;

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

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Remote blob store base URL (e.g., "https://sync.example.com")
    pub remote_url: Option<String>,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Household shared secret; without it snapshots travel in plaintext
    pub shared_secret: Option<String>,
    /// Remote document id, when joining an existing share via config
    pub remote_doc_id: Option<String>,
    /// Enable automatic sync after writes (default: false)
    #[serde(default)]
    pub auto_sync: bool,
    /// Periodic sync interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Conflict resolution strategy
    #[serde(default)]
    pub strategy: ConflictStrategy,
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            api_key: None,
            shared_secret: None,
            remote_doc_id: None,
            auto_sync: false,
            interval_secs: default_interval_secs(),
            strategy: ConflictStrategy::default(),
        }
    }
}

impl SyncSettings {
    /// Returns true if sync is configured (has a remote_url)
    pub fn is_configured(&self) -> bool {
        self.remote_url.is_some()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory for the database and the engine's durable files
    pub data_dir: ConfigValue<PathBuf>,
    /// This family member's name; also the sync actor identity
    pub member: ConfigValue<String>,
    /// Household name shared by all members
    pub household: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Sync configuration
    pub sync: SyncSettings,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    member: Option<String>,
    household: Option<String>,
    sync: Option<SyncSettings>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut member = ConfigValue::new("default".to_string(), ConfigSource::Default);
        let mut household = ConfigValue::new("home".to_string(), ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncSettings::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(name) = file_config.member {
                member = ConfigValue::new(name, ConfigSource::File);
            }
            if let Some(name) = file_config.household {
                household = ConfigValue::new(name, ConfigSource::File);
            }
            if let Some(sync_settings) = file_config.sync {
                sync = sync_settings;
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("HEARTH_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(name) = std::env::var("HEARTH_MEMBER") {
            member = ConfigValue::new(name, ConfigSource::Environment);
        }
        if let Ok(name) = std::env::var("HEARTH_HOUSEHOLD") {
            household = ConfigValue::new(name, ConfigSource::Environment);
        }
        // Sync env var overrides
        if let Ok(url) = std::env::var("HEARTH_SYNC_URL") {
            sync.remote_url = Some(url);
        }
        if let Ok(key) = std::env::var("HEARTH_SYNC_API_KEY") {
            sync.api_key = Some(key);
        }
        if let Ok(secret) = std::env::var("HEARTH_SYNC_SECRET") {
            sync.shared_secret = Some(secret);
        }

        Ok(Self {
            data_dir,
            member,
            household,
            config_file,
            sync,
        })
    }

    /// Path to the SQLite database inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.value.join("hearthbook.db")
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/hearthbook/
    /// - macOS: ~/Library/Application Support/hearthbook/
    /// - Windows: %APPDATA%/hearthbook/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hearthbook")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/hearthbook/
    /// - macOS: ~/Library/Application Support/hearthbook/
    /// - Windows: %APPDATA%/hearthbook/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hearthbook")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
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
        }
    }
}

impl std::error::Error for ConfigError {}
