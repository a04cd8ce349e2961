//! DAC output on the two analog pins that have one (A2, A3).

use log::debug;

use crate::app::ports::AnalogOut;
use crate::error::{Error, Result};
use crate::pins::{A2, A3, PhysicalPin, PinDescriptor, pin_mapping};

pub const DAC_MAX: u16 = 255;

pub struct Dac<P: AnalogOut> {
    port: P,
    pin: PhysicalPin,
}

impl<P: AnalogOut> Dac<P> {
    /// Puts the pin into analog-output mode.  Pins without a DAC are rejected.
    pub fn new(mut port: P, pin: PinDescriptor) -> Result<Self> {
        let physical = pin_mapping(pin)?;
        if physical != A2 && physical != A3 {
            return Err(Error::InvalidArgument("dac pin"));
        }
        port.set_output_mode(physical);
        debug!("dac: output on {physical}");
        Ok(Self { port, pin: physical })
    }

    pub fn pin(&self) -> PhysicalPin {
        self.pin
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// 8-bit level.
    pub fn write(&mut self, value: i64) -> Result<()> {
        let level = u16::try_from(value)
            .ok()
            .filter(|v| *v <= DAC_MAX)
            .ok_or(Error::InvalidArgument("dac value"))?;
        self.port.analog_write(self.pin, level);
        Ok(())
    }
}
