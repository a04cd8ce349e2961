//! Wi-Fi station binding.
//!
//! Wraps a [`WifiRadio`] with the state tracking and argument validation
//! scripts rely on.  `connect` blocks for at most the configured timeout,
//! polling the radio's readiness; on timeout the radio is switched off so a
//! half-associated station never lingers.
//!
//! ```text
//!   Off ──on()──▶ On ──connect()──▶ Connecting ──ready──▶ Connected
//!    ▲                                   │ timeout            │
//!    └───────────────off()───────────────┴────────────────────┘
//! ```

use core::fmt;
use std::net::Ipv4Addr;

use log::{info, warn};

use crate::app::ports::{AccessPoint, Cipher, Clock, Security, WifiRadio};
use crate::config::PortConfig;
use crate::error::Error;
use crate::sockets::ip::parse_ipv4;

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    RadioOff,
    NotConnected,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no Wi-Fi credentials stored"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes, or empty for open)"),
            Self::RadioOff => write!(f, "Wi-Fi radio is off"),
            Self::NotConnected => write!(f, "Wi-Fi not connected"),
        }
    }
}

impl From<WifiError> for Error {
    fn from(e: WifiError) -> Self {
        match e {
            WifiError::NoCredentials => Error::NotFound("wifi credentials"),
            WifiError::InvalidSsid => Error::InvalidArgument("ssid"),
            WifiError::InvalidPassword => Error::InvalidArgument("wifi password"),
            WifiError::RadioOff => Error::InvalidState("wifi radio off"),
            WifiError::NotConnected => Error::InvalidState("wifi not connected"),
        }
    }
}

type Result<T> = core::result::Result<T, WifiError>;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<()> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

impl TryFrom<i64> for Security {
    type Error = crate::error::Error;

    fn try_from(v: i64) -> core::result::Result<Self, Self::Error> {
        Ok(match v {
            0 => Self::Unsecured,
            1 => Self::Wep,
            2 => Self::Wpa,
            3 => Self::Wpa2,
            0xff => Self::NotSet,
            _ => return Err(Error::InvalidArgument("wifi security")),
        })
    }
}

impl TryFrom<i64> for Cipher {
    type Error = crate::error::Error;

    fn try_from(v: i64) -> core::result::Result<Self, Self::Error> {
        Ok(match v {
            0 => Self::NotSet,
            1 => Self::Aes,
            2 => Self::Tkip,
            3 => Self::AesTkip,
            _ => return Err(Error::InvalidArgument("wifi cipher")),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Station
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Off,
    On,
    Connecting,
    Connected,
}

pub struct Wifi<R: WifiRadio, C: Clock> {
    radio: R,
    clock: C,
    state: WifiState,
    connect_timeout_ms: u64,
    poll_interval_ms: u32,
}

impl<R: WifiRadio, C: Clock> Wifi<R, C> {
    pub fn new(radio: R, clock: C, cfg: &PortConfig) -> Self {
        Self {
            radio,
            clock,
            state: WifiState::Off,
            connect_timeout_ms: u64::from(cfg.wifi_connect_timeout_ms),
            poll_interval_ms: cfg.wifi_poll_interval_ms.max(1),
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    fn require_on(&self) -> Result<()> {
        if self.state == WifiState::Off { Err(WifiError::RadioOff) } else { Ok(()) }
    }

    fn require_connected(&self) -> Result<()> {
        if self.state == WifiState::Connected { Ok(()) } else { Err(WifiError::NotConnected) }
    }

    // ── Power and association ─────────────────────────────────

    pub fn on(&mut self) {
        self.radio.on();
        if self.state == WifiState::Off {
            self.state = WifiState::On;
        }
    }

    pub fn off(&mut self) {
        self.radio.off();
        self.state = WifiState::Off;
    }

    /// Associate with stored credentials.  `Ok(false)` means the timeout
    /// elapsed; the radio is then off.
    pub fn connect(&mut self) -> Result<bool> {
        if self.state == WifiState::Connected {
            return Ok(true);
        }
        if !self.radio.has_credentials() {
            return Err(WifiError::NoCredentials);
        }
        self.on();
        self.state = WifiState::Connecting;
        self.radio.connect();

        let start = self.clock.now_ms();
        while !self.radio.is_ready() {
            if self.clock.now_ms().saturating_sub(start) >= self.connect_timeout_ms {
                warn!("wifi: not ready after {} ms, powering down", self.connect_timeout_ms);
                self.off();
                return Ok(false);
            }
            self.clock.sleep_ms(self.poll_interval_ms);
        }
        self.state = WifiState::Connected;
        info!("wifi: connected to '{}'", self.radio.ssid());
        Ok(true)
    }

    pub fn disconnect(&mut self) {
        self.radio.disconnect();
        if matches!(self.state, WifiState::Connecting | WifiState::Connected) {
            self.state = WifiState::On;
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == WifiState::Connected && self.radio.is_ready()
    }

    pub fn listen(&mut self, enable: bool) {
        if enable { self.radio.start_listen() } else { self.radio.stop_listen() }
    }

    pub fn listening(&self) -> bool {
        self.radio.is_listening()
    }

    // ── Credentials ───────────────────────────────────────────

    pub fn set_credentials(
        &mut self,
        ssid: &str,
        password: &str,
        security: Security,
        cipher: Cipher,
    ) -> Result<bool> {
        self.require_on()?;
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(self.radio.set_credentials(ssid, password, security, cipher))
    }

    pub fn has_credentials(&self) -> bool {
        self.radio.has_credentials()
    }

    pub fn clear_credentials(&mut self) -> Result<bool> {
        self.require_on()?;
        Ok(self.radio.clear_credentials())
    }

    pub fn credentials(&self) -> Vec<AccessPoint> {
        self.radio.credentials()
    }

    pub fn scan(&mut self) -> Result<Vec<AccessPoint>> {
        self.require_on()?;
        Ok(self.radio.scan())
    }

    // ── Link information ──────────────────────────────────────

    pub fn mac_address(&self) -> [u8; 6] {
        self.radio.mac_address()
    }

    pub fn ssid(&self) -> Result<heapless::String<32>> {
        self.require_connected()?;
        Ok(self.radio.ssid())
    }

    pub fn bssid(&self) -> Result<[u8; 6]> {
        self.require_connected()?;
        Ok(self.radio.bssid())
    }

    pub fn rssi(&self) -> Option<i8> {
        (self.state == WifiState::Connected).then(|| self.radio.rssi())
    }

    pub fn local_ip(&self) -> Result<Ipv4Addr> {
        self.require_connected()?;
        Ok(self.radio.local_ip())
    }

    pub fn subnet_mask(&self) -> Result<Ipv4Addr> {
        self.require_connected()?;
        Ok(self.radio.subnet_mask())
    }

    pub fn gateway_ip(&self) -> Result<Ipv4Addr> {
        self.require_connected()?;
        Ok(self.radio.gateway_ip())
    }

    /// Echo replies out of `tries`.
    pub fn ping(&mut self, ip: &str, tries: i64) -> crate::error::Result<u8> {
        self.require_connected()?;
        let ip = Ipv4Addr::from(parse_ipv4(ip)?);
        let tries = u8::try_from(tries)
            .ok()
            .filter(|t| *t > 0)
            .ok_or(Error::InvalidArgument("ping tries"))?;
        Ok(self.radio.ping(ip, tries))
    }

    pub fn resolve(&mut self, host: &str) -> crate::error::Result<Option<Ipv4Addr>> {
        self.require_connected()?;
        if host.is_empty() {
            return Err(Error::InvalidArgument("host name"));
        }
        Ok(self.radio.resolve(host))
    }
}
