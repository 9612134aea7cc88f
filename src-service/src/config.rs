//! Service configuration loading.

use std::path::{Path, PathBuf};

use spectrascope_common::SpectrumConfig;
use tracing::{debug, info};

use crate::error::ConfigError;

const CONFIG_FILE_NAME: &str = "config.json";

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    let config_dir = directories::BaseDirs::new()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    config_dir.join("spectrascope").join(CONFIG_FILE_NAME)
}

/// Load the configuration.
///
/// An explicit `path` must exist. Without one the default location is tried
/// and a missing file yields the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<SpectrumConfig, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (default_config_path(), false),
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(SpectrumConfig::default());
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };

    let config = parse_config(&contents)?;
    info!("Loaded config from {:?}", path);
    Ok(config)
}

/// Parse a JSON configuration document; absent fields take their defaults.
pub fn parse_config(contents: &str) -> Result<SpectrumConfig, ConfigError> {
    Ok(serde_json::from_str(contents)?)
}
