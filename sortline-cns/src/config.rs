//! Configuration for sortline-cns

use crate::channel::ChannelMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// PLC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlcConfig {
    /// Controller host name or IP address
    pub address: String,
    /// Modbus TCP port
    pub port: u16,
    /// Modbus unit identifier
    pub unit_id: u8,
    /// Coil per object class
    pub coils: ChannelMap,
    /// How long a coil is held active per pulse, in milliseconds
    pub pulse_ms: u64,
    /// Connect timeout in milliseconds; none waits for the OS
    pub connect_timeout_ms: Option<u64>,
    /// Socket read/write timeout in milliseconds; none blocks
    pub io_timeout_ms: Option<u64>,
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            address: "192.168.100.135".to_string(),
            port: 502,
            unit_id: 1,
            coils: ChannelMap::default(),
            pulse_ms: 1000,
            connect_timeout_ms: None,
            io_timeout_ms: None,
        }
    }
}

impl PlcConfig {
    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.address.trim().is_empty() {
            return Err("PLC address must not be empty".to_string());
        }

        if self.port == 0 {
            return Err("PLC port must be greater than 0".to_string());
        }

        if self.pulse_ms > 60_000 {
            return Err("Pulse duration must not exceed 60 seconds".to_string());
        }

        if self.io_timeout_ms == Some(0) || self.connect_timeout_ms == Some(0) {
            return Err("Timeouts must be greater than 0 when set".to_string());
        }

        self.coils.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelId;

    #[test]
    fn test_config_default() {
        let config = PlcConfig::default();
        assert_eq!(config.endpoint(), "192.168.100.135:502");
        assert_eq!(config.pulse_duration(), Duration::from_secs(1));
        assert!(config.io_timeout_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = PlcConfig::default();
        config.address = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = PlcConfig::default();
        config.port = 0;
        assert!(config.validate().is_err());

        let mut config = PlcConfig::default();
        config.pulse_ms = 60_001;
        assert!(config.validate().is_err());

        let mut config = PlcConfig::default();
        config.io_timeout_ms = Some(0);
        assert!(config.validate().is_err());

        let mut config = PlcConfig::default();
        config.coils.original_coke = ChannelId(1280);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_pulse_allowed() {
        let mut config = PlcConfig::default();
        config.pulse_ms = 0;
        assert!(config.validate().is_ok());
    }
}
