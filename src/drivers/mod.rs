//! Peripheral bindings.
//!
//! Each binding wraps exactly one hardware unit and delegates to its port
//! trait (or `embedded-hal` trait).  Units that come in numbered sets (UART1
//! and UART2, SPI1 and SPI2) live in a [`PeripheralBank`] that resolves the
//! script-facing id.

pub mod dac;
pub mod gpio;
pub mod i2c;
pub mod rgb;
pub mod servo;
pub mod spi;
pub mod timer;
pub mod uart;
pub mod wifi;

use crate::error::{Error, Result};

/// Fixed set of `N` units addressed by 1-based id.
pub struct PeripheralBank<T, const N: usize> {
    units: [T; N],
    label: &'static str,
}

impl<T, const N: usize> PeripheralBank<T, N> {
    pub fn new(label: &'static str, units: [T; N]) -> Self {
        Self { units, label }
    }

    /// Unit for script id `id` (1..=N).
    pub fn get(&mut self, id: i64) -> Result<&mut T> {
        let idx = usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .filter(|i| *i < N)
            .ok_or(Error::InvalidArgument(self.label))?;
        Ok(&mut self.units[idx])
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.units.iter_mut()
    }
}

/// Range-check a script integer into a byte.
pub(crate) fn byte_arg(value: i64, what: &'static str) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::InvalidArgument(what))
}
