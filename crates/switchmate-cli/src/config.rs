//! Configuration file for the CLI.
//!
//! The file is TOML and every key is optional:
//!
//! ```toml
//! [device]
//! address = "C4:BE:84:12:34:56"
//! name = "Hallway"
//! notify = true
//! update_interval_secs = 60
//!
//! [link]
//! connection_timeout_secs = 15
//! discovery_timeout_secs = 10
//! operation_timeout_secs = 10
//! reconnect_delay_secs = 5
//! scan_duration_secs = 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use switchmate_core::{DriverOptions, LinkConfig};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub link: LinkSection,
}

/// `[device]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Default device when `--device` is not given.
    pub address: Option<String>,
    /// Display name; defaults to the device identifier.
    pub name: Option<String>,
    /// Subscribe to notifications.
    pub notify: bool,
    /// Seconds between polls.
    pub update_interval_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: None,
            name: None,
            notify: false,
            update_interval_secs: 60,
        }
    }
}

/// `[link]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSection {
    pub connection_timeout_secs: u64,
    pub discovery_timeout_secs: u64,
    pub operation_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
    pub scan_duration_secs: u64,
}

impl Default for LinkSection {
    fn default() -> Self {
        let defaults = LinkConfig::default();
        Self {
            connection_timeout_secs: defaults.connection_timeout.as_secs(),
            discovery_timeout_secs: defaults.discovery_timeout.as_secs(),
            operation_timeout_secs: defaults.operation_timeout.as_secs(),
            reconnect_delay_secs: defaults.reconnect_delay.as_secs(),
            scan_duration_secs: defaults.scan_duration.as_secs(),
        }
    }
}

impl Config {
    /// Load from the default path, or defaults if no file exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Load from an explicit path if given, else from the default path, and
    /// validate.
    pub fn load_validated(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::load_default()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every field and report all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.device.update_interval_secs == 0 {
            errors.push(ValidationError {
                field: "device.update_interval_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(name) = &self.device.name
            && name.trim().is_empty()
        {
            errors.push(ValidationError {
                field: "device.name".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let timeouts = [
            ("link.connection_timeout_secs", self.link.connection_timeout_secs),
            ("link.discovery_timeout_secs", self.link.discovery_timeout_secs),
            ("link.operation_timeout_secs", self.link.operation_timeout_secs),
            ("link.scan_duration_secs", self.link.scan_duration_secs),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Pick the device: explicit argument first, then the config file.
    pub fn resolve_device(&self, device: Option<String>) -> Option<String> {
        device
            .filter(|d| !d.trim().is_empty())
            .or_else(|| self.device.address.clone())
    }

    /// Driver options for `identifier`. `notify` forces notify mode on.
    pub fn driver_options(&self, identifier: &str, notify: bool) -> DriverOptions {
        let name = self.device.name.as_deref().unwrap_or(identifier);
        DriverOptions::new(name)
            .notify(notify || self.device.notify)
            .update_interval(Duration::from_secs(self.device.update_interval_secs))
    }

    /// Link timeouts.
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::new()
            .connection_timeout(Duration::from_secs(self.link.connection_timeout_secs))
            .discovery_timeout(Duration::from_secs(self.link.discovery_timeout_secs))
            .operation_timeout(Duration::from_secs(self.link.operation_timeout_secs))
            .reconnect_delay(Duration::from_secs(self.link.reconnect_delay_secs))
            .scan_duration(Duration::from_secs(self.link.scan_duration_secs))
    }
}

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// One invalid field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `<config dir>/switchmate/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("switchmate")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let file = write_config("");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_full_file() {
        let file = write_config(
            r#"
            [device]
            address = "C4:BE:84:12:34:56"
            name = "Hallway"
            notify = true
            update_interval_secs = 30

            [link]
            reconnect_delay_secs = 0
            "#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.device.address.as_deref(), Some("C4:BE:84:12:34:56"));
        assert!(config.device.notify);

        let options = config.driver_options("ignored", false);
        assert_eq!(options.name, "Hallway");
        assert!(options.notify);
        assert_eq!(options.update_interval, Duration::from_secs(30));

        let link = config.link_config();
        assert_eq!(link.reconnect_delay, Duration::ZERO);
        assert_eq!(link.connection_timeout, LinkConfig::default().connection_timeout);
        assert!(link.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = Config::load("/nonexistent/switchmate/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let file = write_config("[device\nnotify = ");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.device.update_interval_secs = 0;
        config.link.operation_timeout_secs = 0;

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "device.update_interval_secs");
                assert_eq!(errors[1].field, "link.operation_timeout_secs");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_device_prefers_arg() {
        let mut config = Config::default();
        config.device.address = Some("from-config".to_string());
        assert_eq!(
            config.resolve_device(Some("from-arg".to_string())).as_deref(),
            Some("from-arg")
        );
        assert_eq!(
            config.resolve_device(Some(" ".to_string())).as_deref(),
            Some("from-config")
        );
        assert_eq!(Config::default().resolve_device(None), None);
    }

    #[test]
    fn test_driver_options_defaults_name_to_identifier() {
        let options = Config::default().driver_options("c4be84123456", true);
        assert_eq!(options.name, "c4be84123456");
        assert!(options.notify);
    }
}
