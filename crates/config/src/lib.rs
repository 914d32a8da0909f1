//! Configuration loading, validation, and management for controlgate.
//!
//! Loads configuration from `.controlgate/config.toml` (or the path named by
//! `CONTROLGATE_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CONTROLGATE_CONFIG";
/// Environment variable overriding [`AppConfig::contracts_dir`].
pub const CONTRACTS_DIR_ENV: &str = "CONTROLGATE_CONTRACTS_DIR";
/// Environment variable overriding [`AppConfig::product_label`].
pub const PRODUCT_LABEL_ENV: &str = "CONTROLGATE_PRODUCT_LABEL";

/// The root configuration structure.
///
/// Maps directly to `.controlgate/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory scanned for `*.yaml` / `*.yml` contract files
    #[serde(default = "default_contracts_dir")]
    pub contracts_dir: PathBuf,

    /// Product name shown in the directive header
    #[serde(default = "default_product_label")]
    pub product_label: String,

    /// Resource limits for trigger-condition evaluation
    #[serde(default)]
    pub limits: LimitsConfig,
}

fn default_contracts_dir() -> PathBuf {
    PathBuf::from(".controlgate")
}
fn default_product_label() -> String {
    "CONTROLGATE".into()
}

/// Bounds applied to every trigger-condition evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Longest accepted expression, in bytes
    #[serde(default = "default_max_expression_len")]
    pub max_expression_len: usize,

    /// Deepest accepted nesting of sub-expressions
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Evaluation step budget per condition
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Largest string or list any single operation may produce
    #[serde(default = "default_max_collection_len")]
    pub max_collection_len: usize,
}

fn default_max_expression_len() -> usize {
    4096
}
fn default_max_depth() -> usize {
    64
}
fn default_max_steps() -> u64 {
    10_000
}
fn default_max_collection_len() -> usize {
    100_000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_expression_len: default_max_expression_len(),
            max_depth: default_max_depth(),
            max_steps: default_max_steps(),
            max_collection_len: default_max_collection_len(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// `CONTROLGATE_CONFIG` names the file if set, otherwise
    /// `.controlgate/config.toml` relative to the working directory.
    /// Environment variables then override individual settings:
    /// - `CONTROLGATE_CONTRACTS_DIR`
    /// - `CONTROLGATE_PRODUCT_LABEL`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        Self::load_at(&path)
    }

    /// Load `path`, then apply environment overrides and validate.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// The config file used when `CONTROLGATE_CONFIG` is unset.
    pub fn default_path() -> PathBuf {
        default_contracts_dir().join("config.toml")
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`AppConfig::load`]).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(CONTRACTS_DIR_ENV).filter(|d| !d.is_empty()) {
            self.contracts_dir = PathBuf::from(dir);
        }
        if let Some(label) = lookup(PRODUCT_LABEL_ENV).filter(|l| !l.is_empty()) {
            self.product_label = label;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.product_label.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "product_label cannot be empty".into(),
            ));
        }

        let limits = &self.limits;
        if limits.max_expression_len == 0
            || limits.max_depth == 0
            || limits.max_steps == 0
            || limits.max_collection_len == 0
        {
            return Err(ConfigError::ValidationError(
                "all [limits] values must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            contracts_dir: default_contracts_dir(),
            product_label: default_product_label(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.contracts_dir, PathBuf::from(".controlgate"));
        assert_eq!(config.product_label, "CONTROLGATE");
        assert_eq!(config.limits.max_steps, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.contracts_dir, config.contracts_dir);
        assert_eq!(parsed.limits, config.limits);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "product_label = \"DATAGUSTO\"\n[limits]\nmax_steps = 500\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.product_label, "DATAGUSTO");
        assert_eq!(config.limits.max_steps, 500);
        assert_eq!(config.limits.max_depth, 64);
        assert_eq!(config.contracts_dir, PathBuf::from(".controlgate"));
    }

    #[test]
    fn zero_limit_rejected() {
        let config = AppConfig {
            limits: LimitsConfig {
                max_depth: 0,
                ..LimitsConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_label_rejected() {
        let config = AppConfig {
            product_label: "  ".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().product_label, "CONTROLGATE");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "limits = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn overrides_apply_non_empty_values() {
        let vars: HashMap<&str, &str> = [
            (CONTRACTS_DIR_ENV, "/etc/policies"),
            (PRODUCT_LABEL_ENV, ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.contracts_dir, PathBuf::from("/etc/policies"));
        assert_eq!(config.product_label, "CONTROLGATE");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("CONTROLGATE"));
        assert!(toml_str.contains("max_collection_len"));
    }
}
