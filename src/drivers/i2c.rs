//! I2C master binding over any `embedded_hal::i2c::I2c` bus.
//!
//! Bus failures are reported as a [`TransferStatus`] code (the Wiring
//! `endTransmission` numbering scripts already know) rather than an error;
//! only bad arguments and use before `init` are errors.

use embedded_hal::i2c::{ErrorKind as BusErrorKind, I2c, NoAcknowledgeSource};
use log::debug;

use super::byte_arg;
use crate::app::script::Value;
use crate::error::{Error, Result};
use crate::payload::Payload;

/// Bytes one transaction may carry.
pub const TRANSFER_MAX: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferStatus {
    Success = 0,
    DataTooLong = 1,
    AddressNack = 2,
    DataNack = 3,
    Other = 4,
}

impl TransferStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_bus_error<E: embedded_hal::i2c::Error>(err: &E) -> Self {
        match err.kind() {
            BusErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => Self::AddressNack,
            BusErrorKind::NoAcknowledge(_) => Self::DataNack,
            BusErrorKind::Overrun => Self::DataTooLong,
            _ => Self::Other,
        }
    }
}

/// Scripts see the numeric code.
impl From<TransferStatus> for Value {
    fn from(status: TransferStatus) -> Self {
        Self::Int(i64::from(status.code()))
    }
}

pub struct I2cBus<B> {
    bus: B,
    enabled: bool,
}

fn address(addr: i64) -> Result<u8> {
    u8::try_from(addr)
        .ok()
        .filter(|a| *a <= 0x7F)
        .ok_or(Error::InvalidArgument("i2c address"))
}

impl<B: I2c> I2cBus<B> {
    pub fn new(bus: B) -> Self {
        Self { bus, enabled: false }
    }

    pub fn init(&mut self) {
        self.enabled = true;
    }

    pub fn deinit(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn enabled(&mut self) -> Result<&mut B> {
        if self.enabled {
            Ok(&mut self.bus)
        } else {
            Err(Error::InvalidState("i2c not initialised"))
        }
    }

    fn status(addr: u8, res: core::result::Result<(), B::Error>) -> TransferStatus {
        match res {
            Ok(()) => TransferStatus::Success,
            Err(e) => {
                let status = TransferStatus::from_bus_error(&e);
                debug!("i2c 0x{addr:02x}: {e:?} -> status {}", status.code());
                status
            }
        }
    }

    pub fn send_char(&mut self, value: i64, addr: i64) -> Result<TransferStatus> {
        let byte = byte_arg(value, "i2c byte")?;
        let addr = address(addr)?;
        let res = self.enabled()?.write(addr, &[byte]);
        Ok(Self::status(addr, res))
    }

    /// One byte from `addr`, or `None` when the device does not answer.
    pub fn recv_char(&mut self, addr: i64) -> Result<Option<u8>> {
        let addr = address(addr)?;
        let mut buf = [0u8; 1];
        let res = self.enabled()?.read(addr, &mut buf);
        Ok((Self::status(addr, res) == TransferStatus::Success).then_some(buf[0]))
    }

    pub fn send(&mut self, payload: Payload<'_>, addr: i64) -> Result<TransferStatus> {
        let addr = address(addr)?;
        let bytes = payload.to_bytes()?;
        let bus = self.enabled()?;
        if bytes.len() > TRANSFER_MAX {
            return Ok(TransferStatus::DataTooLong);
        }
        let res = bus.write(addr, &bytes);
        Ok(Self::status(addr, res))
    }

    /// Read exactly `len` bytes into `out`; nothing is appended on failure.
    pub fn recv(&mut self, out: &mut Vec<u8>, addr: i64, len: usize) -> Result<TransferStatus> {
        let addr = address(addr)?;
        if len > TRANSFER_MAX {
            return Err(Error::InvalidArgument("i2c read length"));
        }
        let bus = self.enabled()?;
        let mut buf = [0u8; TRANSFER_MAX];
        let res = bus.read(addr, &mut buf[..len]);
        let status = Self::status(addr, res);
        if status == TransferStatus::Success {
            out.extend_from_slice(&buf[..len]);
        }
        Ok(status)
    }
}
