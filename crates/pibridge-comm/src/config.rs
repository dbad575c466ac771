use std::path::{Path, PathBuf};
use std::time::Duration;

use pibridge_transport::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Default response timeout for local I/O modules.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(10);
/// Default response timeout for gateway-addressed modules.
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_millis(50);
/// Serial device of the piBridge segment on RevPi base modules.
pub const DEFAULT_DEVICE: &str = "/dev/ttyAMA0";

/// Inclusive range of valid module addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    pub first: u8,
    pub last: u8,
}

impl AddressRange {
    /// Create a range covering `first..=last`.
    pub const fn new(first: u8, last: u8) -> Self {
        Self { first, last }
    }

    /// Returns true if `address` lies in the range.
    pub fn contains(&self, address: u8) -> bool {
        (self.first..=self.last).contains(&address)
    }
}

/// Serial line settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// tty device path.
    pub device: PathBuf,
    /// Line speed in baud.
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Bridge configuration.
///
/// Every field has a default, so a config file only lists what it changes:
///
/// ```json
/// { "gate_timeout_ms": 200, "serial": { "device": "/dev/ttyUSB0" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Response timeout for local I/O requests, in milliseconds.
    pub io_timeout_ms: u64,
    /// Default response timeout for gateway requests, in milliseconds.
    pub gate_timeout_ms: u64,
    /// Valid local I/O module addresses. 0 is the broadcast address.
    pub io_addresses: AddressRange,
    /// Valid gateway destinations. 0 is the controller itself.
    pub gate_addresses: AddressRange,
    /// Serial line used by [`PiBridge::open_serial`](crate::PiBridge::open_serial).
    pub serial: SerialConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            io_timeout_ms: DEFAULT_IO_TIMEOUT.as_millis() as u64,
            gate_timeout_ms: DEFAULT_GATE_TIMEOUT.as_millis() as u64,
            io_addresses: AddressRange::new(1, 63),
            gate_addresses: AddressRange::new(1, 254),
            serial: SerialConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| BridgeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.io_timeout_ms == 0 || self.gate_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        for (name, range) in [
            ("io_addresses", self.io_addresses),
            ("gate_addresses", self.gate_addresses),
        ] {
            if range.first > range.last {
                return Err(BridgeError::Config(format!(
                    "{name}: first ({}) is greater than last ({})",
                    range.first, range.last
                )));
            }
        }
        Ok(())
    }

    /// Local I/O response timeout.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Default gateway response timeout.
    pub fn gate_timeout(&self) -> Duration {
        Duration::from_millis(self.gate_timeout_ms)
    }

    /// Override the local I/O response timeout.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Override the default gateway response timeout.
    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BridgeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.io_timeout(), DEFAULT_IO_TIMEOUT);
        assert_eq!(config.gate_timeout(), DEFAULT_GATE_TIMEOUT);
        assert!(config.gate_timeout() > config.io_timeout());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = BridgeConfig::from_json_str(
            r#"{ "gate_timeout_ms": 200, "serial": { "device": "/dev/ttyUSB0" } }"#,
        )
        .unwrap();
        assert_eq!(config.gate_timeout(), Duration::from_millis(200));
        assert_eq!(config.io_timeout(), DEFAULT_IO_TIMEOUT);
        assert_eq!(config.serial.device, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(config.serial.baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = BridgeConfig::from_json_str(r#"{ "io_timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn inverted_range_rejected() {
        let err =
            BridgeConfig::from_json_str(r#"{ "io_addresses": { "first": 9, "last": 2 } }"#)
                .unwrap_err();
        assert!(matches!(err, BridgeError::Config(msg) if msg.contains("io_addresses")));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = BridgeConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, BridgeError::Json(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = format!("/tmp/pibridge-missing-config-{}.json", std::process::id());
        let err = BridgeConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigRead { .. }));
    }

    #[test]
    fn address_range_is_inclusive() {
        let range = AddressRange::new(1, 63);
        assert!(!range.contains(0));
        assert!(range.contains(1));
        assert!(range.contains(63));
        assert!(!range.contains(64));
    }
}
