//! Nesting-safe global interrupt mask.
//!
//! Only the outermost `disable_all` masks the hardware and only the matching
//! outermost `enable_all` unmasks it, so an inner critical section can never
//! re-enable interrupts while an outer one is still running.

use core::sync::atomic::{AtomicU32, Ordering};

use log::warn;

use crate::app::ports::InterruptHal;

#[derive(Debug, Default)]
pub struct InterruptGate {
    depth: AtomicU32,
}

impl InterruptGate {
    pub const fn new() -> Self {
        Self { depth: AtomicU32::new(0) }
    }

    /// Current nesting depth; 0 means unmasked.
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Acquire)
    }

    pub fn disable_all<H: InterruptHal + ?Sized>(&self, hal: &H) {
        if self.depth.fetch_add(1, Ordering::AcqRel) == 0 {
            hal.disable_all();
        }
    }

    /// Undo one `disable_all`.  An enable with nothing to undo is ignored
    /// and reported as `false`.
    pub fn enable_all<H: InterruptHal + ?Sized>(&self, hal: &H) -> bool {
        match self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| d.checked_sub(1))
        {
            Ok(1) => {
                hal.enable_all();
                true
            }
            Ok(_) => true,
            Err(_) => {
                warn!("irq: enable_all without matching disable_all ignored");
                false
            }
        }
    }

    /// Mask until the returned guard drops.
    pub fn enter<'a, H: InterruptHal + ?Sized>(&'a self, hal: &'a H) -> CriticalGuard<'a, H> {
        self.disable_all(hal);
        CriticalGuard { gate: self, hal }
    }
}

/// Restores the mask depth on drop.
pub struct CriticalGuard<'a, H: InterruptHal + ?Sized> {
    gate: &'a InterruptGate,
    hal: &'a H,
}

impl<H: InterruptHal + ?Sized> Drop for CriticalGuard<'_, H> {
    fn drop(&mut self) {
        self.gate.enable_all(self.hal);
    }
}
