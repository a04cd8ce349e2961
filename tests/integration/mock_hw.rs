//! Mock `embedded-hal` peripherals for integration tests.
//!
//! Records every bus call so tests can assert on the full command history
//! without touching real I2C/PWM/timer registers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation};
use embedded_hal::pwm::{self, SetDutyCycle};

use duoport::app::ports::HeapLock;

// ── I2C ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cCall {
    Write { addr: u8, bytes: Vec<u8> },
    Read { addr: u8, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError(pub ErrorKind);

impl i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// I2C bus with a set of responding devices.  Each device answers reads
/// from its canned register contents; unknown addresses NACK.
#[derive(Debug, Default)]
pub struct MockI2c {
    pub calls: Vec<I2cCall>,
    pub devices: HashMap<u8, Vec<u8>>,
    /// Addresses that ACK their address but NACK data bytes.
    pub data_nack: Vec<u8>,
    /// Error injected on the next transaction, whatever the address.
    pub fail_next: Option<ErrorKind>,
}

#[allow(dead_code)]
impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, addr: u8, contents: &[u8]) -> Self {
        self.devices.insert(addr, contents.to_vec());
        self
    }

    pub fn written_to(&self, addr: u8) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                I2cCall::Write { addr: a, bytes } if *a == addr => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = BusError;
}

impl I2c for MockI2c {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
        if let Some(kind) = self.fail_next.take() {
            return Err(BusError(kind));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    self.calls.push(I2cCall::Write { addr: address, bytes: bytes.to_vec() });
                    if !self.devices.contains_key(&address) {
                        return Err(BusError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)));
                    }
                    if self.data_nack.contains(&address) {
                        return Err(BusError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)));
                    }
                }
                Operation::Read(buf) => {
                    self.calls.push(I2cCall::Read { addr: address, len: buf.len() });
                    let Some(contents) = self.devices.get(&address) else {
                        return Err(BusError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)));
                    };
                    for (dst, src) in buf.iter_mut().zip(contents.iter().cycle()) {
                        *dst = *src;
                    }
                }
            }
        }
        Ok(())
    }
}

// ── PWM ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmFault;

impl pwm::Error for PwmFault {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// PWM channel with a 0..=1000 duty range.
#[derive(Debug, Default)]
pub struct MockPwm {
    pub duties: Vec<u16>,
    pub refuse: bool,
}

impl MockPwm {
    pub const MAX: u16 = 1000;

    pub fn new() -> Self {
        Self::default()
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = PwmFault;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), PwmFault> {
        if self.refuse {
            return Err(PwmFault);
        }
        self.duties.push(duty);
        Ok(())
    }
}

// ── Delay ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockDelay {
    pub total_ns: u64,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

// ── Heap lock ─────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct HeapCounters {
    pub depth: AtomicU32,
    pub locks: AtomicU32,
}

/// Heap lock whose counters can be shared with a callback, so the callback
/// can check it runs while the heap is locked.
#[derive(Debug, Default, Clone)]
pub struct SharedHeap(pub Arc<HeapCounters>);

impl SharedHeap {
    pub fn depth(&self) -> u32 {
        self.0.depth.load(Ordering::SeqCst)
    }

    pub fn locks(&self) -> u32 {
        self.0.locks.load(Ordering::SeqCst)
    }
}

impl HeapLock for SharedHeap {
    fn lock(&self) {
        self.0.depth.fetch_add(1, Ordering::SeqCst);
        self.0.locks.fetch_add(1, Ordering::SeqCst);
    }

    fn unlock(&self) {
        self.0.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
