//! Bounded byte ring shared between the BLE stack callback and mainline.
//!
//! ```text
//!  producer (stack callback)          consumer (main loop)
//!  ────────────────────────           ────────────────────
//!  push / extend  ──▶  [ Deque<u8, N> ]  ──▶  pop / drain_into
//! ```
//!
//! Every operation runs inside one short critical section, so a whole
//! inbound write lands atomically and the ring stays consistent even if a
//! second producer or consumer shows up.  Nothing blocks beyond that
//! section.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Deque;

use crate::error::{Error, Result};

pub struct RingBuffer<const N: usize> {
    bytes: Mutex<CriticalSectionRawMutex, RefCell<Deque<u8, N>>>,
    label: &'static str,
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new(label: &'static str) -> Self {
        Self { bytes: Mutex::new(RefCell::new(Deque::new())), label }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes currently stored.
    pub fn len(&self) -> usize {
        self.bytes.lock(|b| b.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    pub fn free(&self) -> usize {
        N - self.len()
    }

    /// Fails with `BufferFull` when `len == N`.
    pub fn push(&self, byte: u8) -> Result<()> {
        self.bytes
            .lock(|b| b.borrow_mut().push_back(byte))
            .map_err(|_| Error::BufferFull(self.label))
    }

    /// Push as much of `data` as fits, in order.  Returns how many bytes
    /// were stored; the tail that did not fit is left to the caller.
    pub fn extend(&self, data: &[u8]) -> usize {
        self.bytes.lock(|b| {
            let mut b = b.borrow_mut();
            let n = data.len().min(N - b.len());
            for &byte in &data[..n] {
                let stored = b.push_back(byte);
                debug_assert!(stored.is_ok(), "n is bounded by the free space");
            }
            n
        })
    }

    /// Fails with `BufferEmpty` when `len == 0`.
    pub fn pop(&self) -> Result<u8> {
        self.bytes
            .lock(|b| b.borrow_mut().pop_front())
            .ok_or(Error::BufferEmpty(self.label))
    }

    /// Pop up to `max` bytes onto `out`, FIFO.  Returns how many moved.
    pub fn drain_into(&self, out: &mut Vec<u8>, max: usize) -> usize {
        self.bytes.lock(|b| {
            let mut b = b.borrow_mut();
            let n = b.len().min(max);
            out.reserve(n);
            out.extend((0..n).map_while(|_| b.pop_front()));
            n
        })
    }

    /// Drop everything currently stored; returns how much.
    pub fn clear(&self) -> usize {
        self.bytes.lock(|b| {
            let mut b = b.borrow_mut();
            let dropped = b.len();
            b.clear();
            dropped
        })
    }
}
