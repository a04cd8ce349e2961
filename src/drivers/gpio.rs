//! Digital pin binding over the `embedded-hal` digital traits.
//!
//! Reading a pin switches it to input with pull-up, writing switches it to
//! push-pull output, the same auto-direction behaviour scripts get from the
//! Arduino-style core.  The bit-banged helpers (`shift_out`, `shift_in`,
//! `pulse_in`) take two pins or a clock and follow the Wiring timing.

use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::app::ports::{BitOrder, Clock, PinConfig};
use crate::error::{Error, Result};
use crate::pins::{PhysicalPin, PinDescriptor, PinMode, Port, Pull, pin_mapping};

/// Default `pulse_in` timeout: one second, as in Wiring.
pub const PULSE_TIMEOUT_US: u64 = 1_000_000;

const IO: &str = "gpio io";

pub struct GpioPin<P> {
    io: P,
    descriptor: PinDescriptor,
    physical: PhysicalPin,
    mode: Option<PinMode>,
}

impl<P> GpioPin<P>
where
    P: InputPin + OutputPin + PinConfig,
{
    /// Bind `io` to a logical pin.  Fails for descriptors with no header pin.
    pub fn new(io: P, descriptor: PinDescriptor) -> Result<Self> {
        let physical = pin_mapping(descriptor)?;
        Ok(Self { io, descriptor, physical, mode: None })
    }

    pub fn io(&self) -> &P {
        &self.io
    }

    pub fn descriptor(&self) -> PinDescriptor {
        self.descriptor
    }

    pub fn physical(&self) -> PhysicalPin {
        self.physical
    }

    /// Board name ("D4", "A0").
    pub fn name(&self) -> String {
        self.physical.to_string()
    }

    /// CPU name first, then the board name.
    pub fn names(&self) -> Vec<String> {
        let port = match self.descriptor.port {
            Port::A => 'A',
            Port::B => 'B',
        };
        vec![format!("P{port}{}", self.descriptor.index), self.name()]
    }

    /// GPIO port number: 0 for A, 1 for B.
    pub fn port(&self) -> i64 {
        match self.descriptor.port {
            Port::A => 0,
            Port::B => 1,
        }
    }

    /// Bit index within the port.
    pub fn pin(&self) -> i64 {
        i64::from(self.descriptor.index)
    }

    /// Mode last applied through this binding.
    pub fn mode(&self) -> Option<PinMode> {
        self.mode
    }

    /// Apply a mode code (0..=7).  A pull (0 none, 1 up, 2 down) refines
    /// plain input mode and is rejected with any other mode.
    pub fn init(&mut self, mode: i64, pull: Option<i64>) -> Result<()> {
        let mode = PinMode::try_from(mode)?;
        let mode = match pull.map(Pull::try_from).transpose()? {
            None | Some(Pull::None) => mode,
            Some(pull) if mode == PinMode::Input => pull.input_mode(),
            Some(_) => return Err(Error::InvalidArgument("pull needs input mode")),
        };
        self.configure(mode);
        Ok(())
    }

    fn configure(&mut self, mode: PinMode) {
        self.io.set_mode(mode);
        self.mode = Some(mode);
    }

    fn level(&mut self) -> Result<bool> {
        self.io.is_high().map_err(|e| {
            warn!("gpio {}: read failed: {e:?}", self.physical);
            Error::InvalidState(IO)
        })
    }

    fn drive(&mut self, high: bool) -> Result<()> {
        let res = if high { self.io.set_high() } else { self.io.set_low() };
        res.map_err(|e| {
            warn!("gpio {}: write failed: {e:?}", self.physical);
            Error::InvalidState(IO)
        })
    }

    /// Read the level as 0 or 1, after switching to input with pull-up.
    pub fn value(&mut self) -> Result<u8> {
        self.configure(PinMode::InputPullUp);
        Ok(u8::from(self.level()?))
    }

    /// Drive the pin, after switching to output.
    pub fn set_value(&mut self, high: bool) -> Result<()> {
        self.configure(PinMode::Output);
        self.drive(high)
    }

    pub fn high(&mut self) -> Result<()> {
        self.set_value(true)
    }

    pub fn low(&mut self) -> Result<()> {
        self.set_value(false)
    }
}

fn bit_positions(order: BitOrder) -> impl Iterator<Item = u8> {
    (0..8u8).map(move |i| match order {
        BitOrder::LsbFirst => i,
        BitOrder::MsbFirst => 7 - i,
    })
}

/// Clock `value` out on `data`, one bit per rising edge of `clock`.
pub fn shift_out<D, C>(data: &mut GpioPin<D>, clock: &mut GpioPin<C>, order: i64, value: i64) -> Result<()>
where
    D: InputPin + OutputPin + PinConfig,
    C: InputPin + OutputPin + PinConfig,
{
    let order = BitOrder::try_from(order)?;
    let value = u8::try_from(value).map_err(|_| Error::InvalidArgument("shift value"))?;
    data.configure(PinMode::Output);
    clock.configure(PinMode::Output);
    for bit in bit_positions(order) {
        data.drive((value >> bit) & 1 == 1)?;
        clock.drive(true)?;
        clock.drive(false)?;
    }
    Ok(())
}

/// Sample one byte from `data`, reading each bit while `clock` is high.
pub fn shift_in<D, C>(data: &mut GpioPin<D>, clock: &mut GpioPin<C>, order: i64) -> Result<u8>
where
    D: InputPin + OutputPin + PinConfig,
    C: InputPin + OutputPin + PinConfig,
{
    let order = BitOrder::try_from(order)?;
    data.configure(PinMode::Input);
    clock.configure(PinMode::Output);
    let mut value = 0u8;
    for bit in bit_positions(order) {
        clock.drive(true)?;
        if data.level()? {
            value |= 1 << bit;
        }
        clock.drive(false)?;
    }
    Ok(value)
}

/// Length in microseconds of the next pulse at `level`, or 0 if no whole
/// pulse completes within `timeout_us`.  A pulse already in progress when
/// the call starts is skipped.
pub fn pulse_in<P, K>(pin: &mut GpioPin<P>, level: i64, clock: &K, timeout_us: u64) -> Result<u32>
where
    P: InputPin + OutputPin + PinConfig,
    K: Clock,
{
    let level = match level {
        0 => false,
        1 => true,
        _ => return Err(Error::InvalidArgument("pulse level")),
    };
    pin.configure(PinMode::Input);
    let start = clock.now_us();
    let wait_while = |pin: &mut GpioPin<P>, at: bool| -> Result<bool> {
        while pin.level()? == at {
            if clock.now_us().saturating_sub(start) >= timeout_us {
                return Ok(false);
            }
        }
        Ok(true)
    };

    if !wait_while(pin, level)? || !wait_while(pin, !level)? {
        return Ok(0);
    }
    let rise = clock.now_us();
    if !wait_while(pin, level)? {
        return Ok(0);
    }
    Ok(u32::try_from(clock.now_us().saturating_sub(rise)).unwrap_or(u32::MAX))
}
