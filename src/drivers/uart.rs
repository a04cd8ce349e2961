//! Hardware UART binding (ids 1 and 2).

use log::debug;

use super::{PeripheralBank, byte_arg};
use crate::app::ports::SerialPort;
use crate::error::{Error, Result};
use crate::payload::Payload;

pub type UartBank<P> = PeripheralBank<Uart<P>, 2>;

pub fn uart_bank<P: SerialPort>(uart1: P, uart2: P) -> UartBank<P> {
    PeripheralBank::new("uart id", [Uart::new(1, uart1), Uart::new(2, uart2)])
}

pub struct Uart<P: SerialPort> {
    id: u8,
    port: P,
}

impl<P: SerialPort> Uart<P> {
    pub fn new(id: u8, port: P) -> Self {
        Self { id, port }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn init(&mut self, baud: i64) -> Result<()> {
        let baud = u32::try_from(baud)
            .ok()
            .filter(|b| *b > 0)
            .ok_or(Error::InvalidArgument("uart baud rate"))?;
        self.port.begin(baud);
        debug!("uart{}: {} baud", self.id, baud);
        Ok(())
    }

    pub fn deinit(&mut self) {
        self.port.end();
    }

    pub fn is_enabled(&self) -> bool {
        self.port.is_enabled()
    }

    fn enabled(&mut self) -> Result<&mut P> {
        if self.port.is_enabled() {
            Ok(&mut self.port)
        } else {
            Err(Error::InvalidState("uart not initialised"))
        }
    }

    /// Bytes waiting in the receive buffer.
    pub fn any(&mut self) -> Result<usize> {
        Ok(self.enabled()?.available())
    }

    pub fn read_char(&mut self) -> Result<u8> {
        self.enabled()?.read().ok_or(Error::BufferEmpty("uart rx"))
    }

    pub fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.enabled()?.peek())
    }

    pub fn write_char(&mut self, value: i64) -> Result<bool> {
        let byte = byte_arg(value, "uart byte")?;
        Ok(self.enabled()?.write(byte))
    }

    /// Returns bytes the port accepted; stops at the first refusal.
    pub fn write(&mut self, payload: Payload<'_>) -> Result<usize> {
        let bytes = payload.to_bytes()?;
        let port = self.enabled()?;
        Ok(bytes.iter().take_while(|b| port.write(**b)).count())
    }

    /// Append up to `max` buffered bytes to `out`.
    pub fn read(&mut self, out: &mut Vec<u8>, max: usize) -> Result<usize> {
        let port = self.enabled()?;
        let before = out.len();
        while out.len() - before < max {
            match port.read() {
                Some(b) => out.push(b),
                None => break,
            }
        }
        Ok(out.len() - before)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.enabled()?.flush();
        Ok(())
    }
}
