//! Configuration module
//!
//! Driver settings stored as TOML in the platform config directory

mod settings;

pub use settings::{ConfigError, DriverConfig, LoggingConfig};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Name of the settings file
pub const CONFIG_FILE_NAME: &str = "fixlink.toml";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "fixlink", "Fixlink")
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default settings file
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Get the log directory
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}
