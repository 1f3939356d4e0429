//! Driver settings

use crate::core::convert::OutputFormat;
use crate::core::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No config directory on this platform
    #[error("could not determine config directory")]
    NoConfigDir,

    /// File could not be read or written
    #[error("{path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("{path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// Settings could not be serialized
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Semantically invalid value
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Sensor connection
    pub connection: TransportConfig,
    /// Enabled message families
    pub formats: Vec<String>,
    /// Polling rate of the read loop \[Hz\]
    pub rate_hz: f64,
    /// Delay before reconnecting after a lost connection \[s\]
    pub reconnect_delay_secs: f64,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            connection: TransportConfig::default(),
            formats: [
                OutputFormat::Odometry,
                OutputFormat::OdomStatus,
                OutputFormat::Llh,
                OutputFormat::RawImu,
                OutputFormat::CorrImu,
                OutputFormat::Tf,
                OutputFormat::Text,
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            rate_hz: 200.0,
            reconnect_delay_secs: 5.0,
            logging: LoggingConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from `path`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_error)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rate_hz.is_finite() && self.rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!("rate_hz must be positive, got {}", self.rate_hz)));
        }
        if !(self.reconnect_delay_secs.is_finite() && self.reconnect_delay_secs >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "reconnect_delay_secs must not be negative, got {}",
                self.reconnect_delay_secs
            )));
        }
        Ok(())
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
    /// Also write a daily rotated log file here
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}
