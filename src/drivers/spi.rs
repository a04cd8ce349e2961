//! SPI master binding (ids 1 and 2).
//!
//! Every transfer is full duplex: `send_char` clocks one byte out and returns
//! the byte clocked in, `recv_char` clocks out `0x00`.

use super::{PeripheralBank, byte_arg};
use crate::app::ports::{BitOrder, SpiPort};
use crate::error::{Error, Result};
use crate::payload::Payload;

pub type SpiBank<P> = PeripheralBank<Spi<P>, 2>;

pub fn spi_bank<P: SpiPort>(spi1: P, spi2: P) -> SpiBank<P> {
    PeripheralBank::new("spi id", [Spi::new(1, spi1), Spi::new(2, spi2)])
}

pub struct Spi<P: SpiPort> {
    id: u8,
    port: P,
    enabled: bool,
}

impl<P: SpiPort> Spi<P> {
    pub fn new(id: u8, port: P) -> Self {
        Self { id, port, enabled: false }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn init(&mut self) {
        self.port.begin();
        self.enabled = true;
    }

    pub fn deinit(&mut self) {
        self.port.end();
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn enabled(&mut self) -> Result<&mut P> {
        if self.enabled {
            Ok(&mut self.port)
        } else {
            Err(Error::InvalidState("spi not initialised"))
        }
    }

    pub fn send_char(&mut self, value: i64) -> Result<u8> {
        let byte = byte_arg(value, "spi byte")?;
        Ok(self.enabled()?.transfer(byte))
    }

    pub fn recv_char(&mut self) -> Result<u8> {
        Ok(self.enabled()?.transfer(0))
    }

    /// Clock out the whole payload; returns the number of bytes sent.
    pub fn send(&mut self, payload: Payload<'_>) -> Result<usize> {
        let bytes = payload.to_bytes()?;
        let port = self.enabled()?;
        for b in bytes.iter() {
            port.transfer(*b);
        }
        Ok(bytes.len())
    }

    /// Clock in exactly `len` bytes.  Zero bytes are data, not terminators.
    pub fn recv(&mut self, out: &mut Vec<u8>, len: usize) -> Result<usize> {
        let port = self.enabled()?;
        out.extend((0..len).map(|_| port.transfer(0)));
        Ok(len)
    }

    /// Divider must be a power of two in 2..=256.
    pub fn set_clock_divider(&mut self, divider: i64) -> Result<()> {
        let div = u16::try_from(divider)
            .ok()
            .filter(|d| (2..=256).contains(d) && d.is_power_of_two())
            .ok_or(Error::InvalidArgument("spi clock divider"))?;
        self.port.set_clock_divider(div);
        Ok(())
    }

    /// 0 = LSB first, 1 = MSB first.
    pub fn set_bit_order(&mut self, order: i64) -> Result<()> {
        self.port.set_bit_order(BitOrder::try_from(order)?);
        Ok(())
    }

    /// SPI mode 0..=3 (CPOL/CPHA).
    pub fn set_data_mode(&mut self, mode: i64) -> Result<()> {
        let mode = u8::try_from(mode)
            .ok()
            .filter(|m| *m <= 3)
            .ok_or(Error::InvalidArgument("spi data mode"))?;
        self.port.set_data_mode(mode);
        Ok(())
    }
}
