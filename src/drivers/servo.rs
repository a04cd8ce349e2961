//! Hobby-servo binding: angle in degrees, mapped linearly onto the pulse
//! width range.

use crate::app::ports::ServoPort;
use crate::error::{Error, Result};
use crate::pins::{PhysicalPin, PinDescriptor, pin_mapping};

pub const MIN_PULSE_US: u16 = 544;
pub const MAX_PULSE_US: u16 = 2400;
pub const MAX_ANGLE: u16 = 180;
/// Trim is a correction, not a second pulse range.
pub const MAX_TRIM_US: i16 = 500;

const SPAN: u32 = (MAX_PULSE_US - MIN_PULSE_US) as u32;

fn angle_to_us(angle: u16) -> u16 {
    let offset = (u32::from(angle) * SPAN + u32::from(MAX_ANGLE) / 2) / u32::from(MAX_ANGLE);
    MIN_PULSE_US + offset as u16
}

fn us_to_angle(us: u16) -> u8 {
    let offset = u32::from(us.clamp(MIN_PULSE_US, MAX_PULSE_US) - MIN_PULSE_US);
    ((offset * u32::from(MAX_ANGLE) + SPAN / 2) / SPAN) as u8
}

pub struct Servo<P: ServoPort> {
    port: P,
    pin: Option<PhysicalPin>,
}

impl<P: ServoPort> Servo<P> {
    pub fn new(port: P) -> Self {
        Self { port, pin: None }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Returns `false` if the pin cannot generate a servo pulse.
    pub fn attach(&mut self, pin: PinDescriptor) -> Result<bool> {
        let physical = pin_mapping(pin)?;
        if self.pin.is_some() {
            self.port.detach();
        }
        let ok = self.port.attach(physical);
        self.pin = ok.then_some(physical);
        Ok(ok)
    }

    pub fn attached(&self) -> bool {
        self.pin.is_some() && self.port.attached()
    }

    pub fn pin(&self) -> Option<PhysicalPin> {
        self.pin
    }

    fn require_attached(&self) -> Result<()> {
        if self.attached() { Ok(()) } else { Err(Error::InvalidState("servo not attached")) }
    }

    pub fn detach(&mut self) -> Result<()> {
        self.require_attached()?;
        self.port.detach();
        self.pin = None;
        Ok(())
    }

    pub fn write(&mut self, angle: i64) -> Result<()> {
        let angle = u16::try_from(angle)
            .ok()
            .filter(|a| *a <= MAX_ANGLE)
            .ok_or(Error::InvalidArgument("servo angle"))?;
        self.require_attached()?;
        self.port.write_us(angle_to_us(angle));
        Ok(())
    }

    pub fn write_us(&mut self, pulse_us: i64) -> Result<()> {
        let us = u16::try_from(pulse_us)
            .ok()
            .filter(|us| (MIN_PULSE_US..=MAX_PULSE_US).contains(us))
            .ok_or(Error::InvalidArgument("servo pulse width"))?;
        self.require_attached()?;
        self.port.write_us(us);
        Ok(())
    }

    pub fn read(&self) -> Result<u8> {
        self.require_attached()?;
        Ok(us_to_angle(self.port.read_us()))
    }

    pub fn read_us(&self) -> Result<u16> {
        self.require_attached()?;
        Ok(self.port.read_us())
    }

    pub fn set_trim(&mut self, trim_us: i64) -> Result<()> {
        let trim = i16::try_from(trim_us)
            .ok()
            .filter(|t| (-MAX_TRIM_US..=MAX_TRIM_US).contains(t))
            .ok_or(Error::InvalidArgument("servo trim"))?;
        self.port.set_trim(trim);
        Ok(())
    }
}
