//! # Pool Configuration
//!
//! Configuration for the barcode pool services and the `pool-admin` binary.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BARCODE_POOL_DB=/srv/pool.db                                       │
//! │     BARCODE_POOL_CANDIDATE_WINDOW=32                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/barcode-pool/pool.toml (Linux)                           │
//! │     ~/Library/Application Support/com.barcode.pool/pool.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/barcode-pool/pool.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [import]
//! error_display_limit = 50
//! validate_format = true
//! max_file_bytes = 67108864
//!
//! [allocation]
//! candidate_window = 16
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use barcode_core::{DEFAULT_CANDIDATE_WINDOW, DEFAULT_ERROR_DISPLAY_LIMIT};

use crate::pool::{DbConfig, DEFAULT_MAX_FILE_BYTES};

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// `[database]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// `[import]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    #[serde(default = "default_error_display_limit")]
    pub error_display_limit: usize,

    /// Default for imports that do not say otherwise.
    #[serde(default = "default_true")]
    pub validate_format: bool,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

fn default_error_display_limit() -> usize {
    DEFAULT_ERROR_DISPLAY_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_max_file_bytes() -> usize {
    DEFAULT_MAX_FILE_BYTES
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings {
            error_display_limit: default_error_display_limit(),
            validate_format: true,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// `[allocation]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSettings {
    #[serde(default = "default_candidate_window")]
    pub candidate_window: u32,
}

fn default_candidate_window() -> u32 {
    DEFAULT_CANDIDATE_WINDOW
}

impl Default for AllocationSettings {
    fn default() -> Self {
        AllocationSettings {
            candidate_window: default_candidate_window(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete pool configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub import: ImportSettings,

    #[serde(default)]
    pub allocation: AllocationSettings,
}

impl PoolConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`pool.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let explicit = config_path.is_some();
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading pool config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else if explicit {
                return Err(ConfigError::Invalid(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load pool config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: &std::path::Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!(?path, "Pool config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.allocation.candidate_window == 0 {
            return Err(ConfigError::Invalid(
                "allocation.candidate_window must be greater than 0".into(),
            ));
        }

        if self.import.max_file_bytes == 0 {
            return Err(ConfigError::Invalid(
                "import.max_file_bytes must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BARCODE_POOL_DB") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup("BARCODE_POOL_MAX_CONNECTIONS") {
            match value.parse() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %value, "Ignoring invalid BARCODE_POOL_MAX_CONNECTIONS"),
            }
        }

        if let Some(value) = lookup("BARCODE_POOL_ERROR_LIMIT") {
            match value.parse() {
                Ok(limit) => self.import.error_display_limit = limit,
                Err(_) => warn!(value = %value, "Ignoring invalid BARCODE_POOL_ERROR_LIMIT"),
            }
        }

        if let Some(value) = lookup("BARCODE_POOL_CANDIDATE_WINDOW") {
            match value.parse() {
                Ok(window) => self.allocation.candidate_window = window,
                Err(_) => warn!(value = %value, "Ignoring invalid BARCODE_POOL_CANDIDATE_WINDOW"),
            }
        }

        if let Some(value) = lookup("BARCODE_POOL_VALIDATE_FORMAT") {
            match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.import.validate_format = true,
                "0" | "false" | "no" | "off" => self.import.validate_format = false,
                _ => warn!(value = %value, "Ignoring invalid BARCODE_POOL_VALIDATE_FORMAT"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "barcode", "pool")
            .map(|dirs| dirs.config_dir().join("pool.toml"))
    }

    /// Database file: configured path, else the platform data dir, else the working dir.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("com", "barcode", "pool")
                .map(|dirs| dirs.data_dir().join("pool.db"))
                .unwrap_or_else(|| PathBuf::from("pool.db"))
        })
    }

    /// Builds the connection settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path())
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .error_display_limit(self.import.error_display_limit)
            .candidate_window(self.allocation.candidate_window)
            .max_file_bytes(self.import.max_file_bytes)
    }
}
