//! Binding-layer configuration.
//!
//! Pool capacities are fixed at compile time (they size static arrays).
//! Everything else is a tunable that can be loaded from a JSON document or a
//! postcard blob persisted by the host runtime.

use core::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Compile-time capacities
// ---------------------------------------------------------------------------

/// TCP server descriptors in the socket pool.
pub const MAX_SERVER_SOCKETS: usize = 3;
/// TCP client descriptors available to accepted connections.
pub const MAX_CLIENT_SOCKETS: usize = 20;
/// External interrupt lines (EXTI0..EXTI15).
pub const EXTI_LINES: usize = 16;
/// Inbound ring: max length of the write characteristic.
pub const BLE_INBOUND_CAPACITY: usize = 256;
/// Outbound ring: max length of the notify characteristic.
pub const BLE_OUTBOUND_CAPACITY: usize = 20;

/// Largest single native TCP read; one Ethernet MSS.  Longer `read`
/// requests return at most this much per call.
pub const TCP_READ_CHUNK: usize = 1460;

/// Longest device name that fits a scan response next to its AD header.
pub const DEVICE_NAME_MAX: usize = 20;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The document could not be parsed.
    Malformed,
    /// A field holds a value outside its legal range.
    OutOfRange(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed configuration document"),
            Self::OutOfRange(field) => write!(f, "configuration field out of range: {field}"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Malformed => Self::InvalidArgument("configuration document"),
            ConfigError::OutOfRange(field) => Self::InvalidArgument(field),
        }
    }
}

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// BLE peripheral parameters, in controller units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Complete local name put in the scan response.
    pub device_name: heapless::String<DEVICE_NAME_MAX>,
    /// Advertising interval, 0.625 ms units.
    pub adv_interval: u16,
    /// Minimum connection interval, 1.25 ms units.
    pub conn_interval_min: u16,
    /// Maximum connection interval, 1.25 ms units.
    pub conn_interval_max: u16,
    pub slave_latency: u16,
    /// Supervision timeout, 10 ms units.
    pub supervision_timeout: u16,
}

impl Default for BleConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        // Fits: the literal is shorter than DEVICE_NAME_MAX.
        let _ = device_name.push_str("Duo-Python");
        Self {
            device_name,
            adv_interval: 0x0030,        // 30 ms
            conn_interval_min: 0x0028,   // 50 ms
            conn_interval_max: 0x0190,   // 500 ms
            slave_latency: 0,
            supervision_timeout: 0x03E8, // 10 s
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub ble: BleConfig,
    /// Upper bound on waiting for the radio to report ready after connect.
    pub wifi_connect_timeout_ms: u32,
    /// Sleep between readiness polls while connecting.
    pub wifi_poll_interval_ms: u32,
    /// Connect timeout handed to the socket HAL.
    pub tcp_connect_timeout_ms: u32,
    pub default_uart_baud: u32,
    /// Port the bring-up binary listens on.
    pub demo_server_port: u16,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            ble: BleConfig::default(),
            wifi_connect_timeout_ms: 5000,
            wifi_poll_interval_ms: 10,
            tcp_connect_timeout_ms: 5000,
            default_uart_baud: 115_200,
            demo_server_port: 80,
        }
    }
}

impl PortConfig {
    /// Parse a JSON document and validate it.  Missing fields take defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_slice(bytes).map_err(|_| ConfigError::Malformed)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Decode a postcard blob and validate it.
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        let cfg: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Malformed)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_postcard(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Malformed)
    }

    /// Range checks follow the Bluetooth Core limits for each parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ble = &self.ble;
        if ble.device_name.is_empty() || !ble.device_name.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
            return Err(ConfigError::OutOfRange("ble.device_name"));
        }
        if !(0x0020..=0x4000).contains(&ble.adv_interval) {
            return Err(ConfigError::OutOfRange("ble.adv_interval"));
        }
        if !(0x0006..=0x0C80).contains(&ble.conn_interval_min)
            || !(0x0006..=0x0C80).contains(&ble.conn_interval_max)
            || ble.conn_interval_min > ble.conn_interval_max
        {
            return Err(ConfigError::OutOfRange("ble.conn_interval"));
        }
        if ble.slave_latency > 0x01F3 {
            return Err(ConfigError::OutOfRange("ble.slave_latency"));
        }
        if !(0x000A..=0x0C80).contains(&ble.supervision_timeout) {
            return Err(ConfigError::OutOfRange("ble.supervision_timeout"));
        }
        if self.wifi_poll_interval_ms == 0 || self.wifi_poll_interval_ms > self.wifi_connect_timeout_ms {
            return Err(ConfigError::OutOfRange("wifi_poll_interval_ms"));
        }
        if self.default_uart_baud == 0 {
            return Err(ConfigError::OutOfRange("default_uart_baud"));
        }
        Ok(())
    }
}
