//! ISR → main-loop hand-off for interrupt lines.
//!
//! A real ISR trampoline cannot safely run a scripted callback, so it only
//! sets the line's bit here.  The main loop drains the set and dispatches.
//!
//! ```text
//!  EXTI ISR ──raise(line)──▶ PendingLines (AtomicU32) ──drain──▶ dispatch(line)
//! ```
//!
//! Several edges on one line before the main loop runs collapse into one
//! dispatch.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::EXTI_LINES;

#[derive(Debug, Default)]
pub struct PendingLines {
    bits: AtomicU32,
}

impl PendingLines {
    pub const fn new() -> Self {
        Self { bits: AtomicU32::new(0) }
    }

    /// Mark `line` pending.  Safe from ISR context (one atomic OR).
    /// Returns `false` for a line the controller does not have.
    pub fn raise(&self, line: u8) -> bool {
        if usize::from(line) >= EXTI_LINES {
            return false;
        }
        self.bits.fetch_or(1 << line, Ordering::Release);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.bits.load(Ordering::Acquire) == 0
    }

    /// Take every pending line and hand each to `handler`, lowest first.
    pub fn drain(&self, mut handler: impl FnMut(u8)) -> u32 {
        let mut taken = self.bits.swap(0, Ordering::AcqRel);
        let count = taken.count_ones();
        while taken != 0 {
            let line = taken.trailing_zeros() as u8;
            taken &= taken - 1;
            handler(line);
        }
        count
    }
}
