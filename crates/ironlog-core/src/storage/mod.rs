mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, HealthConfig, HistoryConfig, SessionConfig, UnitsConfig, WeightUnit};
pub use database::SqliteStore;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `IRONLOG_DATA_DIR` wins when set. Otherwise `~/.config/ironlog`, or
/// `~/.config/ironlog-dev` with `IRONLOG_ENV=dev`.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("IRONLOG_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("IRONLOG_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("ironlog-dev")
            } else {
                base_dir.join("ironlog")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
