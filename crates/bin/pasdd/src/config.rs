//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `pasd.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::str::FromStr;

use serde::Deserialize;

use pasd_adapter_modbus::ModbusClientConfig;
use pasd_domain::device::MAX_SMARTBOXES;

const CONFIG_FILE: &str = "pasd.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport listeners.
    pub server: ServerConfig,
    /// Station topology.
    pub devices: DevicesConfig,
    /// Which backend answers requests.
    pub backend: BackendConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Listener addresses of both transports.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// JSON transport, `host:port`.
    pub json_bind: String,
    /// Modbus ASCII transport, `host:port`.
    pub modbus_bind: String,
}

/// Station topology.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Smartboxes behind the hub.
    pub smartboxes: u8,
}

/// Backend kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process simulator.
    #[default]
    Simulator,
    /// Devices behind a Modbus ASCII gateway.
    Modbus,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simulator" => Ok(Self::Simulator),
            "modbus" => Ok(Self::Modbus),
            other => Err(ConfigError::Validation(format!(
                "backend must be simulator or modbus, got {other:?}"
            ))),
        }
    }
}

/// Backend selection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Gateway settings, required by the `modbus` backend.
    pub bus: Option<ModbusClientConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            json_bind: "0.0.0.0:5000".to_string(),
            modbus_bind: "0.0.0.0:5020".to_string(),
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            smartboxes: MAX_SMARTBOXES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "pasdd=info,pasd=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `pasd.toml` (if present), apply
    /// environment-variable overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, an override
    /// does not parse, or the result is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply overrides, `var` looking up an environment variable by name.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = var("PASD_JSON_BIND") {
            self.server.json_bind = val;
        }
        if let Some(val) = var("PASD_MODBUS_BIND") {
            self.server.modbus_bind = val;
        }
        if let Some(val) = var("PASD_SMARTBOXES") {
            self.devices.smartboxes = val.parse().map_err(|_| {
                ConfigError::Validation(format!("PASD_SMARTBOXES must be a number, got {val:?}"))
            })?;
        }
        if let Some(val) = var("PASD_BACKEND") {
            self.backend.kind = val.parse()?;
        }
        if let Some(val) = var("PASD_BUS_ADDR") {
            self.backend
                .bus
                .get_or_insert_with(ModbusClientConfig::default)
                .address = val;
        }
        if let Some(val) = var("PASD_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_bind("server.json_bind", &self.server.json_bind)?;
        check_bind("server.modbus_bind", &self.server.modbus_bind)?;
        if self.devices.smartboxes > MAX_SMARTBOXES {
            return Err(ConfigError::Validation(format!(
                "at most {MAX_SMARTBOXES} smartboxes, got {}",
                self.devices.smartboxes
            )));
        }
        if self.backend.kind == BackendKind::Modbus
            && self
                .backend
                .bus
                .as_ref()
                .is_none_or(|bus| bus.address.is_empty())
        {
            return Err(ConfigError::Validation(
                "the modbus backend needs backend.bus.address".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_bind(field: &str, bind: &str) -> Result<(), ConfigError> {
    let port = bind
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse::<u16>().ok())
        .ok_or_else(|| ConfigError::Validation(format!("{field} must be host:port, got {bind:?}")))?;
    if port == 0 {
        return Err(ConfigError::Validation(format!("{field} port must be non-zero")));
    }
    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
