/*!
 * Configuration management for GridLink.
 *
 * This module provides functionality to load, validate, and access configuration
 * settings for GridLink components.
 */
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Core configuration for GridLink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Device connection and retry configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Report ingestion configuration
    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Per-device settings
    #[serde(default)]
    pub devices: DevicesConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application environment (development, production, etc.)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (trace, debug, info, warn, error or an `EnvFilter` directive)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to include the event target in log lines
    #[serde(default = "default_true")]
    pub with_target: bool,

    /// Whether to use ANSI colours
    #[serde(default)]
    pub ansi: bool,
}

/// Device connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// MMS port of the devices
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of retries after the first attempt of a command
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay between command attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Timeout for establishing an association in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Timeout for a single command attempt in milliseconds
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

/// Report ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Capacity of the per-device report channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Log a full dump of every report at debug level
    #[serde(default = "default_true")]
    pub log_report_details: bool,
}

/// Per-device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// Server (IED) name used when a device has no explicit one
    #[serde(default = "default_server_name")]
    pub default_server_name: String,

    /// Server names keyed by device identification
    #[serde(default)]
    pub server_names: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Delay between command attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Timeout for establishing an association
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Timeout for a single command attempt
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl DevicesConfig {
    /// Resolve the server name of a device.
    ///
    /// Configuration sources may lowercase keys, so a lowercase entry matches too.
    pub fn server_name(&self, device_identification: &str) -> &str {
        self.server_names
            .get(device_identification)
            .or_else(|| self.server_names.get(&device_identification.to_lowercase()))
            .map(String::as_str)
            .unwrap_or(&self.default_server_name)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
            ansi: false,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            log_report_details: true,
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            default_server_name: default_server_name(),
            server_names: HashMap::new(),
        }
    }
}

fn default_app_name() -> String {
    "gridlink".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    102
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_operation_timeout_ms() -> u64 {
    30_000
}

fn default_channel_capacity() -> usize {
    256
}

fn default_server_name() -> String {
    "ZOWN_RTU".to_string()
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
    override_with: Option<Config>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Override with an existing config
    pub fn override_with(mut self, config: Config) -> Self {
        self.override_with = Some(config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        if let Some(config) = self.override_with {
            return Ok(config);
        }

        let mut config_builder = ConfigLib::builder().add_source(
            ConfigLib::try_from(&Config::default())
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            let path = Path::new(&config_file);
            if path.exists() {
                debug!("Loading configuration from {}", config_file);
                config_builder = config_builder.add_source(File::with_name(&config_file));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: Config = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }
}

impl Config {
    /// Check values the adapter cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.reporting.channel_capacity == 0 {
            return Err(Error::config("reporting.channel_capacity must be greater than 0"));
        }
        if self.connection.operation_timeout_ms == 0 {
            return Err(Error::config("connection.operation_timeout_ms must be greater than 0"));
        }
        if self.devices.default_server_name.is_empty() {
            return Err(Error::config("devices.default_server_name must not be empty"));
        }
        Ok(())
    }
}

/// A thread-safe reference to a configuration
#[derive(Debug, Clone)]
pub struct SharedConfig(Arc<Config>);

impl SharedConfig {
    /// Create a new SharedConfig
    pub fn new(config: Config) -> Self {
        Self(Arc::new(config))
    }

    /// Get a reference to the config
    pub fn get(&self) -> &Config {
        &self.0
    }
}

impl From<Config> for SharedConfig {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

impl AsRef<Config> for SharedConfig {
    fn as_ref(&self) -> &Config {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.app_name, "gridlink");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.connection.port, 102);
        assert_eq!(config.connection.max_retries, 2);
        assert_eq!(config.devices.default_server_name, "ZOWN_RTU");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.general.app_name, "gridlink");
        assert_eq!(config.reporting.channel_capacity, 256);
    }

    #[test_log::test]
    fn test_config_builder_with_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("gridlink.toml");

        {
            let mut file = File::create(&file_path)?;
            file.write_all(
                br#"
                [logging]
                level = "debug"

                [connection]
                max_retries = 5
                retry_delay_ms = 250

                [devices]
                default_server_name = "RTU_DEFAULT"

                [devices.server_names]
                "RTU-0001" = "ZOWN_RTU_A"
            "#,
            )?;
        }

        let config = ConfigBuilder::new().with_config_file(file_path).build()?;

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.connection.max_retries, 5);
        assert_eq!(config.connection.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.devices.server_name("RTU-0001"), "ZOWN_RTU_A");
        assert_eq!(config.devices.server_name("RTU-0002"), "RTU_DEFAULT");

        Ok(())
    }

    #[test]
    fn test_config_builder_with_env() -> Result<()> {
        env::set_var("GRIDLINK_TEST__GENERAL__APP_NAME", "env-app");
        env::set_var("GRIDLINK_TEST__CONNECTION__OPERATION_TIMEOUT_MS", "1500");

        let config = ConfigBuilder::new()
            .with_environment_prefix("gridlink_test")
            .build()?;

        assert_eq!(config.general.app_name, "env-app");
        assert_eq!(config.connection.operation_timeout(), Duration::from_millis(1500));

        env::remove_var("GRIDLINK_TEST__GENERAL__APP_NAME");
        env::remove_var("GRIDLINK_TEST__CONNECTION__OPERATION_TIMEOUT_MS");

        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.reporting.channel_capacity = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_shared_config() {
        let shared = SharedConfig::new(Config::default());
        let shared2 = shared.clone();
        assert_eq!(shared2.get().general.app_name, "gridlink");
    }
}
