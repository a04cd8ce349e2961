//! Pin mapping for the Duo header.
//!
//! Scripts address pins by a logical descriptor (port letter plus index
//! within the port, the index doubling as the EXTI line).  Drivers need the
//! physical board pin, which the two lookup tables below provide.  Every
//! component that touches GPIO goes through [`pin_mapping`].

use core::fmt;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Physical board pins
// ---------------------------------------------------------------------------

/// Board-level pin number as printed on the Duo header (D0..D17).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalPin(pub u8);

pub const D0: PhysicalPin = PhysicalPin(0);
pub const D1: PhysicalPin = PhysicalPin(1);
pub const D2: PhysicalPin = PhysicalPin(2);
pub const D3: PhysicalPin = PhysicalPin(3);
pub const D4: PhysicalPin = PhysicalPin(4);
pub const D5: PhysicalPin = PhysicalPin(5);
pub const D6: PhysicalPin = PhysicalPin(6);
pub const D7: PhysicalPin = PhysicalPin(7);
pub const TX: PhysicalPin = PhysicalPin(8);
pub const RX: PhysicalPin = PhysicalPin(9);
pub const A0: PhysicalPin = PhysicalPin(10);
pub const A1: PhysicalPin = PhysicalPin(11);
pub const A2: PhysicalPin = PhysicalPin(12);
pub const A3: PhysicalPin = PhysicalPin(13);
pub const A4: PhysicalPin = PhysicalPin(14);
pub const A5: PhysicalPin = PhysicalPin(15);
pub const A6: PhysicalPin = PhysicalPin(16);
pub const A7: PhysicalPin = PhysicalPin(17);

const BOARD_NAMES: [(&str, PhysicalPin); 18] = [
    ("D0", D0), ("D1", D1), ("D2", D2), ("D3", D3),
    ("D4", D4), ("D5", D5), ("D6", D6), ("D7", D7),
    ("TX", TX), ("RX", RX),
    ("A0", A0), ("A1", A1), ("A2", A2), ("A3", A3),
    ("A4", A4), ("A5", A5), ("A6", A6), ("A7", A7),
];

impl fmt::Display for PhysicalPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match BOARD_NAMES.iter().find(|(_, p)| p == self) {
            Some((name, _)) => f.write_str(name),
            None => write!(f, "P{}", self.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Logical descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    A,
    B,
}

/// Logical pin: GPIO port plus bit index.  The index is the EXTI line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinDescriptor {
    pub port: Port,
    pub index: u8,
}

impl PinDescriptor {
    pub const fn new(port: Port, index: u8) -> Self {
        Self { port, index }
    }

    /// External interrupt line served by this pin.
    pub const fn line(self) -> u8 {
        self.index
    }

    /// Resolve a header name ("D3", "A2", "TX") to its descriptor.
    pub fn from_name(name: &str) -> Result<Self> {
        let (_, physical) = BOARD_NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .ok_or(Error::InvalidArgument("pin name"))?;
        Self::from_physical(*physical)
    }

    /// Reverse lookup through the mapping tables.
    pub fn from_physical(physical: PhysicalPin) -> Result<Self> {
        let find = |table: &[Option<PhysicalPin>], port| {
            table
                .iter()
                .position(|p| *p == Some(physical))
                .map(|i| Self::new(port, i as u8))
        };
        find(&PORT_A, Port::A)
            .or_else(|| find(&PORT_B, Port::B))
            .ok_or(Error::InvalidArgument("physical pin"))
    }
}

// Unconnected positions are `None`.
const PORT_A: [Option<PhysicalPin>; 16] = [
    Some(A7), Some(A6), Some(A1), Some(A0),
    Some(A2), Some(A3), Some(A4), Some(A5),
    None, Some(TX), Some(RX), None,
    None, Some(D7), Some(D6), Some(D5),
];

const PORT_B: [Option<PhysicalPin>; 8] = [
    None, None, None, Some(D4),
    Some(D3), Some(D2), Some(D1), Some(D0),
];

/// Translate a logical descriptor to the physical board pin.
pub fn pin_mapping(pin: PinDescriptor) -> Result<PhysicalPin> {
    let table: &[Option<PhysicalPin>] = match pin.port {
        Port::A => &PORT_A,
        Port::B => &PORT_B,
    };
    table
        .get(usize::from(pin.index))
        .copied()
        .flatten()
        .ok_or(Error::InvalidArgument("pin descriptor"))
}

// ---------------------------------------------------------------------------
// Electrical configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PinMode {
    Input = 0,
    Output = 1,
    InputPullUp = 2,
    InputPullDown = 3,
    AfOutputPushPull = 4,
    AfOutputDrain = 5,
    AnalogInput = 6,
    AnalogOutput = 7,
}

impl TryFrom<i64> for PinMode {
    type Error = Error;

    fn try_from(v: i64) -> Result<Self> {
        Ok(match v {
            0 => Self::Input,
            1 => Self::Output,
            2 => Self::InputPullUp,
            3 => Self::InputPullDown,
            4 => Self::AfOutputPushPull,
            5 => Self::AfOutputDrain,
            6 => Self::AnalogInput,
            7 => Self::AnalogOutput,
            _ => return Err(Error::InvalidArgument("invalid pin mode")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

impl TryFrom<i64> for Pull {
    type Error = Error;

    fn try_from(v: i64) -> Result<Self> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Up),
            2 => Ok(Self::Down),
            _ => Err(Error::InvalidArgument("pin pull")),
        }
    }
}

impl Pull {
    /// Input mode that realises this pull setting.
    pub const fn input_mode(self) -> PinMode {
        match self {
            Self::None => PinMode::Input,
            Self::Up => PinMode::InputPullUp,
            Self::Down => PinMode::InputPullDown,
        }
    }
}

/// Edge selection for external interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TriggerMode {
    RisingFalling = 0,
    Rising = 1,
    Falling = 2,
}

impl TryFrom<i64> for TriggerMode {
    type Error = Error;

    fn try_from(v: i64) -> Result<Self> {
        match v {
            0 => Ok(Self::RisingFalling),
            1 => Ok(Self::Rising),
            2 => Ok(Self::Falling),
            _ => Err(Error::InvalidArgument("trigger mode")),
        }
    }
}
