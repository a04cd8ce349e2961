//! Port traits: the boundary between the binding core and vendor HALs.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SocketPool / InterruptRegistry / BleLink / drivers
//! ```
//!
//! The pools and registries consume these traits via generics, so the core
//! never touches a native driver directly.  Where `embedded-hal` 1.0 already
//! defines a contract (I2C, PWM duty, delays, digital levels) the drivers use
//! it instead of a local trait.
//!
//! Port methods report transient failures as `bool`/`Option`; only the core
//! decides what is a precondition error.

use core::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::pins::{PhysicalPin, PinMode, TriggerMode};

// ───────────────────────────────────────────────────────────────
// Socket HAL
// ───────────────────────────────────────────────────────────────

/// Native TCP socket driver.
///
/// Handles are owned values.  `delete_*` consumes the handle so a native
/// socket is released exactly once; the pool never hands out aliases.
pub trait SocketHal {
    type Server;
    type Client;

    /// Construct a server bound to `port`.  `None` when native memory is out.
    fn create_server(&mut self, port: u16) -> Option<Self::Server>;
    /// Start listening.  `false` when the native listen failed.
    fn begin_server(&mut self, server: &mut Self::Server) -> bool;
    fn stop_server(&mut self, server: &mut Self::Server);
    fn delete_server(&mut self, server: Self::Server);
    /// Non-blocking poll for a pending connection.
    fn accept_client(&mut self, server: &mut Self::Server) -> Option<Self::Client>;

    fn create_client(&mut self) -> Option<Self::Client>;
    fn connect_by_ip(&mut self, client: &mut Self::Client, ip: u32, port: u16) -> bool;
    fn connect_by_host(&mut self, client: &mut Self::Client, host: &str, port: u16) -> bool;
    fn stop_client(&mut self, client: &mut Self::Client);
    fn delete_client(&mut self, client: Self::Client);

    /// Returns bytes accepted by the native stack.
    fn write(&mut self, client: &mut Self::Client, data: &[u8]) -> usize;
    /// Returns bytes placed in `buf`; never more than `buf.len()`.
    fn read(&mut self, client: &mut Self::Client, buf: &mut [u8]) -> usize;
    fn available(&mut self, client: &mut Self::Client) -> usize;
    fn connected(&mut self, client: &mut Self::Client) -> bool;
    fn peek(&mut self, client: &mut Self::Client) -> Option<u8>;
    fn flush(&mut self, client: &mut Self::Client);
    /// Discard everything pending in the receive buffer.
    fn flush_buffer(&mut self, client: &mut Self::Client);
    fn status(&mut self, client: &mut Self::Client) -> u8;
}

// ───────────────────────────────────────────────────────────────
// GPIO / interrupt HAL
// ───────────────────────────────────────────────────────────────

/// External interrupt controller plus the pin-mode primitive it needs.
///
/// Methods take `&self` because ISR trampolines and the main loop share the
/// same controller; implementations use interior mutability.
pub trait InterruptHal {
    fn set_pin_mode(&self, pin: PhysicalPin, mode: PinMode);
    /// Route `pin` to EXTI `line` with the given edge.  The adapter's ISR
    /// must end up calling `InterruptRegistry::dispatch(line)` (directly or
    /// through a `PendingLines` set).
    fn attach_interrupt(&self, pin: PhysicalPin, line: u8, mode: TriggerMode);
    fn detach_interrupt(&self, pin: PhysicalPin);
    /// Globally unmask interrupts.
    fn enable_all(&self);
    /// Globally mask interrupts.
    fn disable_all(&self);
}

/// Suspends the scripting runtime's allocator/GC around callback dispatch.
pub trait HeapLock {
    fn lock(&self);
    fn unlock(&self);
}

/// Runtimes without a collector.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHeapLock;

impl HeapLock for NoHeapLock {
    fn lock(&self) {}
    fn unlock(&self) {}
}

// ───────────────────────────────────────────────────────────────
// BLE transport
// ───────────────────────────────────────────────────────────────

/// Attribute handles assigned by the stack at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattHandles {
    /// Value handle of the write characteristic.
    pub rx_value: u16,
    /// Value handle of the notify characteristic.  Its CCCD is `tx_value + 1`.
    pub tx_value: u16,
}

/// BLE stack seen from the link.  Stack events (connect, disconnect,
/// characteristic write) are forwarded by the glue into
/// [`BleLink::on_event`](crate::ble::BleLink::on_event).
pub trait BleTransport {
    /// One-time GATT and GAP setup.  `None` when the stack refused it.
    fn register(&self, layout: &crate::ble::gatt::GattLayout<'_>) -> Option<GattHandles>;
    fn start_advertising(&self);
    fn stop_advertising(&self);
    /// Push one notification on `value_handle`.
    fn send_notify(&self, value_handle: u16, data: &[u8]) -> bool;
    fn disconnect(&self, conn_handle: u16);
}

// ───────────────────────────────────────────────────────────────
// Peripheral HALs without an embedded-hal counterpart
// ───────────────────────────────────────────────────────────────

/// One hardware UART.
pub trait SerialPort {
    fn begin(&mut self, baud: u32);
    fn end(&mut self);
    fn is_enabled(&self) -> bool;
    fn available(&mut self) -> usize;
    fn read(&mut self) -> Option<u8>;
    fn peek(&mut self) -> Option<u8>;
    fn write(&mut self, byte: u8) -> bool;
    fn flush(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    LsbFirst,
    MsbFirst,
}

impl TryFrom<i64> for BitOrder {
    type Error = Error;

    /// 0 = LSB first, 1 = MSB first.
    fn try_from(v: i64) -> Result<Self> {
        match v {
            0 => Ok(Self::LsbFirst),
            1 => Ok(Self::MsbFirst),
            _ => Err(Error::InvalidArgument("bit order")),
        }
    }
}

/// One hardware SPI master, Arduino-style byte exchange.
pub trait SpiPort {
    fn begin(&mut self);
    fn end(&mut self);
    fn transfer(&mut self, byte: u8) -> u8;
    /// System clock divider (2, 4, ... 256).
    fn set_clock_divider(&mut self, divider: u16);
    fn set_bit_order(&mut self, order: BitOrder);
    /// SPI mode 0..=3.
    fn set_data_mode(&mut self, mode: u8);
}

/// Direction and pull switching for one GPIO pad.  Levels go through the
/// `embedded-hal` digital traits on the same type.
pub trait PinConfig {
    fn set_mode(&mut self, mode: PinMode);
}

/// Servo pulse generator.
pub trait ServoPort {
    fn attach(&mut self, pin: PhysicalPin) -> bool;
    fn detach(&mut self);
    fn attached(&self) -> bool;
    fn write_us(&mut self, pulse_us: u16);
    fn read_us(&self) -> u16;
    fn set_trim(&mut self, trim_us: i16);
}

/// DAC-capable analog output.
pub trait AnalogOut {
    fn set_output_mode(&mut self, pin: PhysicalPin);
    fn analog_write(&mut self, pin: PhysicalPin, value: u16);
}

/// On-board RGB LED shared with the system firmware.
pub trait RgbPort {
    fn control(&mut self, take: bool);
    fn controlled(&self) -> bool;
    fn color(&mut self, r: u8, g: u8, b: u8);
    fn brightness(&mut self, level: u8);
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi radio
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Security {
    Unsecured = 0,
    Wep = 1,
    Wpa = 2,
    Wpa2 = 3,
    NotSet = 0xff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cipher {
    NotSet = 0,
    Aes = 1,
    Tkip = 2,
    AesTkip = 3,
}

/// One scan result or stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: heapless::String<32>,
    pub bssid: [u8; 6],
    pub security: Security,
    pub cipher: Cipher,
    pub channel: u8,
    pub rssi: i8,
}

pub trait WifiRadio {
    fn on(&mut self);
    fn off(&mut self);
    /// Start association with stored credentials; completion is observed
    /// through `is_ready`.
    fn connect(&mut self);
    fn disconnect(&mut self);
    fn is_ready(&self) -> bool;
    fn start_listen(&mut self);
    fn stop_listen(&mut self);
    fn is_listening(&self) -> bool;

    fn set_credentials(&mut self, ssid: &str, password: &str, security: Security, cipher: Cipher) -> bool;
    fn has_credentials(&self) -> bool;
    fn clear_credentials(&mut self) -> bool;
    fn credentials(&self) -> Vec<AccessPoint>;
    fn scan(&mut self) -> Vec<AccessPoint>;

    fn mac_address(&self) -> [u8; 6];
    fn ssid(&self) -> heapless::String<32>;
    fn bssid(&self) -> [u8; 6];
    fn rssi(&self) -> i8;
    fn local_ip(&self) -> Ipv4Addr;
    fn subnet_mask(&self) -> Ipv4Addr;
    fn gateway_ip(&self) -> Ipv4Addr;
    /// Echo replies received out of `tries`.
    fn ping(&mut self, ip: Ipv4Addr, tries: u8) -> u8;
    fn resolve(&mut self, host: &str) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Monotonic clock plus a blocking sleep, for bounded polling loops.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn sleep_ms(&self, ms: u32);

    fn now_us(&self) -> u64 {
        self.now_ms().saturating_mul(1000)
    }
}

/// Clock backed by `std::time`.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self { origin: std::time::Instant::now() }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
