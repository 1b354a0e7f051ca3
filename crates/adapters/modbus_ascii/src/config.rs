//! Modbus client configuration.

use std::time::Duration;

use serde::Deserialize;

use pasd_app::retry::RetryPolicy;

/// Configuration for the Modbus client used by the bus backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModbusClientConfig {
    /// Address of the Modbus ASCII gateway, `host:port`.
    pub address: String,
    /// How long to wait for each response, in milliseconds.
    pub timeout_ms: u64,
    /// Reconnection policy.
    pub retry: RetryPolicy,
}

impl Default for ModbusClientConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5020".to_string(),
            timeout_ms: 1_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ModbusClientConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
