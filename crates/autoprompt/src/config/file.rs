//! File-based configuration loading.

use std::path::Path;

use super::AppConfig;
use crate::error::ConfigError;

/// Configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Detect format from path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse `text` in this format.
    pub fn parse(self, text: &str) -> Result<AppConfig, ConfigError> {
        match self {
            Self::Toml => AppConfig::from_toml_str(text),
            Self::Json => AppConfig::from_json_str(text),
        }
    }
}

/// Read and parse a configuration file.
pub(crate) fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnknownFormat {
        path: path.to_path_buf(),
    })?;
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = format.parse(&text)?;
    tracing::debug!(
        path = %path.display(),
        rules = config.automation_rules.len(),
        "loaded configuration"
    );
    Ok(config)
}
