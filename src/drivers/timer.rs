//! PWM output and blocking delays, over the `embedded-hal` traits.

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::error::{Error, Result};
use crate::pins::PhysicalPin;

pub const DUTY_MAX: u16 = 255;

/// One PWM-capable pin driven with an 8-bit duty cycle.
pub struct Pwm<P: SetDutyCycle> {
    channel: P,
    pin: PhysicalPin,
    duty: u8,
}

impl<P: SetDutyCycle> Pwm<P> {
    pub fn new(channel: P, pin: PhysicalPin) -> Self {
        Self { channel, pin, duty: 0 }
    }

    pub fn pin(&self) -> PhysicalPin {
        self.pin
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn channel(&self) -> &P {
        &self.channel
    }

    /// Returns `false` if the timer refused the new duty.
    pub fn write(&mut self, duty: i64) -> Result<bool> {
        let duty = u8::try_from(duty).map_err(|_| Error::InvalidArgument("pwm duty"))?;
        match self.channel.set_duty_cycle_fraction(u16::from(duty), DUTY_MAX) {
            Ok(()) => {
                self.duty = duty;
                Ok(true)
            }
            Err(e) => {
                warn!("pwm {}: duty {duty} refused: {e:?}", self.pin);
                Ok(false)
            }
        }
    }
}

fn delay_arg(value: i64, what: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidArgument(what))
}

pub fn delay_ms<D: DelayNs>(delay: &mut D, ms: i64) -> Result<()> {
    delay.delay_ms(delay_arg(ms, "delay milliseconds")?);
    Ok(())
}

pub fn delay_us<D: DelayNs>(delay: &mut D, us: i64) -> Result<()> {
    delay.delay_us(delay_arg(us, "delay microseconds")?);
    Ok(())
}
