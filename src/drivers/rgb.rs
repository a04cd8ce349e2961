//! On-board RGB LED.  The system firmware drives it until a script takes
//! control.

use super::byte_arg;
use crate::app::ports::RgbPort;
use crate::error::{Error, Result};

pub struct Rgb<P: RgbPort> {
    port: P,
}

impl<P: RgbPort> Rgb<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn control(&mut self, take: bool) {
        self.port.control(take);
    }

    pub fn controlled(&self) -> bool {
        self.port.controlled()
    }

    pub fn color(&mut self, r: i64, g: i64, b: i64) -> Result<()> {
        let (r, g, b) = (byte_arg(r, "rgb red")?, byte_arg(g, "rgb green")?, byte_arg(b, "rgb blue")?);
        if !self.port.controlled() {
            return Err(Error::InvalidState("rgb not under script control"));
        }
        self.port.color(r, g, b);
        Ok(())
    }

    pub fn brightness(&mut self, level: i64) -> Result<()> {
        let level = byte_arg(level, "rgb brightness")?;
        if !self.port.controlled() {
            return Err(Error::InvalidState("rgb not under script control"));
        }
        self.port.brightness(level);
        Ok(())
    }
}
