//! Configuration management for MoveEcho.
//!
//! This module provides the application configuration:
//! - Loading from YAML files
//! - Environment variable overrides (`MOVEECHO__BROKER__URI=...`)
//! - Validation of all settings
//! - Broker, tracking and logging sections

use crate::error::{ConfigError, Result};
use crate::types::{AccuracyMode, BrokerConfig, TransportTag};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Main application configuration.
///
/// # Examples
///
/// ```no_run
/// use moveecho_core::config::AppConfig;
///
/// let config = AppConfig::from_file("moveecho.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Broker connection settings
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Location tracking settings
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate: the file (if any) is
    /// layered under `MOVEECHO__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = config::Config::builder();
        let mut origin = "environment".to_string();

        if let Some(path) = path {
            let path = path.as_ref();
            origin = path.display().to_string();
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("MOVEECHO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: origin,
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        self.broker
            .validate()
            .map_err(|reason| ConfigError::invalid_value("broker", reason))?;

        self.tracking.validate()?;
        self.logging.parse_level()?;

        Ok(())
    }
}

/// Location tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Target interval between samples in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Fastest interval the provider may deliver samples at
    #[serde(default = "default_fastest_interval_ms")]
    pub fastest_interval_ms: u64,

    /// Requested accuracy
    #[serde(default)]
    pub accuracy: AccuracyMode,

    /// Transport tag used when no preference is stored
    #[serde(default)]
    pub default_transport: TransportTag,

    /// File holding the persisted user preferences
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_fastest_interval_ms() -> u64 {
    5_000
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("moveecho-prefs.yaml")
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            fastest_interval_ms: default_fastest_interval_ms(),
            accuracy: AccuracyMode::HighAccuracy,
            default_transport: TransportTag::Car,
            preferences_path: default_preferences_path(),
        }
    }
}

impl TrackingConfig {
    /// Target sampling interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Fastest allowed sampling interval.
    pub fn fastest_interval(&self) -> Duration {
        Duration::from_millis(self.fastest_interval_ms)
    }

    /// Validates the tracking configuration.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(
                ConfigError::invalid_value("tracking.interval_ms", "cannot be 0").into(),
            );
        }

        if self.fastest_interval_ms > self.interval_ms {
            return Err(ConfigError::invalid_value(
                "tracking.fastest_interval_ms",
                format!(
                    "{} exceeds the target interval {}",
                    self.fastest_interval_ms, self.interval_ms
                ),
            )
            .into());
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::invalid_value(
                "logging.level",
                format!("Invalid log level: {}", self.level),
            )
            .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QoS;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.broker.topic, "moveecho/locations");
        assert_eq!(config.tracking.interval(), Duration::from_secs(10));
        assert_eq!(config.tracking.fastest_interval(), Duration::from_secs(5));
        assert_eq!(config.tracking.accuracy, AccuracyMode::HighAccuracy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
broker:
  uri: tcp://10.33.164.188:1883
  topic: moveecho/locations
  qos: at_least_once
  reconnect:
    max_attempts: 3
    delay_secs: 2

tracking:
  interval_ms: 20000
  default_transport: bike

logging:
  level: debug
  format: json
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.broker.uri, "tcp://10.33.164.188:1883");
        assert_eq!(config.broker.qos, QoS::AtLeastOnce);
        assert_eq!(config.broker.reconnect.max_attempts, 3);
        assert_eq!(config.broker.reconnect.delay(), Duration::from_secs(2));
        assert!(config.broker.reconnect.enabled);
        assert_eq!(config.tracking.interval_ms, 20000);
        assert_eq!(config.tracking.fastest_interval_ms, 5000);
        assert_eq!(config.tracking.default_transport, TransportTag::Bike);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(AppConfig::from_yaml("broker: [unclosed").is_err());
    }

    #[test]
    fn test_tracking_validation() {
        let tracking = TrackingConfig {
            interval_ms: 1000,
            fastest_interval_ms: 5000,
            ..Default::default()
        };
        assert!(tracking.validate().is_err());

        let tracking = TrackingConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(tracking.validate().is_err());
    }

    #[test]
    fn test_logging_parse_level() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            ..Default::default()
        };
        assert_eq!(logging.parse_level().unwrap(), Level::DEBUG);

        let invalid = LoggingConfig {
            level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(invalid.parse_level().is_err());
    }

    #[test]
    fn test_invalid_broker_rejected() {
        let mut config = AppConfig::default();
        config.broker.uri = "not a uri".to_string();
        assert!(config.validate().is_err());
    }
}
