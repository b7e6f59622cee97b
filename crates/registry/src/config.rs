//! Registry configuration
//!
//! Loaded from an optional TOML file layered under `PERMREG_`-prefixed
//! environment variables, e.g. `PERMREG_LABEL__MAX_LENGTH=64`.

use crate::errors::{RegistryError, Result};
use config::{Config, Environment, File};
use permreg_types::MAX_LABEL_LENGTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ENV_PREFIX: &str = "PERMREG";
const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub label: LabelConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Label validation limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Longest accepted label in bytes, at most 255
    pub max_length: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            max_length: MAX_LABEL_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Sled database directory. `None` keeps the registry in memory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// One of `pretty`, `compact`, `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(RegistryError::Config(format!(
                    "configuration file {} not found",
                    path.display()
                )));
            }
            debug!(target: "registry", "Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: RegistryConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| RegistryError::Config(e.to_string()))?;
        config.validate()?;

        info!(
            target: "registry",
            "Configuration loaded (max label length {}, storage {})",
            config.label.max_length,
            config
                .storage
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "in-memory".to_string())
        );
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: RegistryConfig =
            toml::from_str(raw).map_err(|e| RegistryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RegistryError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.label.max_length == 0 || self.label.max_length > MAX_LABEL_LENGTH {
            return Err(RegistryError::Config(format!(
                "label.max_length must be within 1..={MAX_LABEL_LENGTH}, got {}",
                self.label.max_length
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(RegistryError::Config(format!(
                "unknown logging.format {:?} (expected one of {:?})",
                self.logging.format, LOG_FORMATS
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(RegistryError::Config("logging.level is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = RegistryConfig::default();
        config.validate().unwrap();
        assert_eq!(config.label.max_length, 255);
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn default_renders_and_parses_back() {
        let rendered = RegistryConfig::default().to_toml_string().unwrap();
        assert!(rendered.contains("max_length = 255"));
        assert_eq!(
            RegistryConfig::from_toml_str(&rendered).unwrap(),
            RegistryConfig::default()
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RegistryConfig::from_toml_str("[label]\nmax_length = 32\n").unwrap();
        assert_eq!(config.label.max_length, 32);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn out_of_range_label_limit_rejected() {
        assert!(RegistryConfig::from_toml_str("[label]\nmax_length = 0\n").is_err());
        assert!(RegistryConfig::from_toml_str("[label]\nmax_length = 256\n").is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let err = RegistryConfig::from_toml_str("[logging]\nformat = \"xml\"\n").unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[storage]\npath = \"/var/lib/permreg\"\n[logging]\nlevel = \"debug\"").unwrap();

        let config = RegistryConfig::load(Some(&path)).unwrap();
        assert_eq!(config.storage.path, Some(PathBuf::from("/var/lib/permreg")));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn load_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RegistryConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }
}
