//! External interrupt registry.
//!
//! One callback slot per EXTI line.  Registration runs inside a masked
//! critical section so an ISR never sees a half-configured line; dispatch
//! runs the callback outside the table lock, with the runtime heap locked,
//! and contains any failure.
//!
//! ```text
//!  attach ─▶ [gate: mask] store cb ▸ pin mode ▸ edge ─▶ [gate: unmask]
//!  ISR ─▶ dispatch(line) ─▶ take cb ─▶ heap.lock ▸ cb(line) ▸ heap.unlock
//!                                        │ Ok      ─▶ put cb back
//!                                        │ Err/panic ─▶ leave slot empty, log
//! ```
//!
//! A callback that fails is disabled for good: the line stays attached in
//! hardware but later edges dispatch to nothing until a new `attach`.

pub mod gate;
pub mod pending;

use core::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, error, info};

use crate::app::ports::{HeapLock, InterruptHal, NoHeapLock};
use crate::config::EXTI_LINES;
use crate::error::{Error, Result};
use crate::pins::{PhysicalPin, PinDescriptor, Pull, TriggerMode, pin_mapping};

pub use gate::{CriticalGuard, InterruptGate};
pub use pending::PendingLines;

/// Interrupt callback.  Receives the line that fired.
pub type IrqCallback = Box<dyn FnMut(u8) -> Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Free,
    Bound,
    /// The callback failed and was disabled.
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No callback bound (or unknown line).
    Idle,
    Handled,
    /// The callback failed and has been unbound.
    Disabled,
}

struct Binding {
    callback: Option<IrqCallback>,
    pin: Option<PhysicalPin>,
    mode: TriggerMode,
    /// Bumped on every attach/detach so a dispatch in flight can tell the
    /// slot was rebound underneath it.
    generation: u32,
    faulted: bool,
}

impl Default for Binding {
    fn default() -> Self {
        Self { callback: None, pin: None, mode: TriggerMode::RisingFalling, generation: 0, faulted: false }
    }
}

type Table = [Binding; EXTI_LINES];

pub struct InterruptRegistry<H: InterruptHal, L: HeapLock = NoHeapLock> {
    hal: H,
    heap: L,
    gate: InterruptGate,
    table: Mutex<CriticalSectionRawMutex, RefCell<Table>>,
}

impl<H: InterruptHal> InterruptRegistry<H> {
    pub fn new(hal: H) -> Self {
        Self::with_heap_lock(hal, NoHeapLock)
    }
}

impl<H: InterruptHal, L: HeapLock> InterruptRegistry<H, L> {
    pub fn with_heap_lock(hal: H, heap: L) -> Self {
        Self {
            hal,
            heap,
            gate: InterruptGate::new(),
            table: Mutex::new(RefCell::new(core::array::from_fn(|_| Binding::default()))),
        }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    fn line_of(pin: PinDescriptor) -> Result<(PhysicalPin, usize)> {
        let physical = pin_mapping(pin)?;
        let line = usize::from(pin.line());
        if line >= EXTI_LINES {
            return Err(Error::InvalidArgument("interrupt line"));
        }
        Ok((physical, line))
    }

    /// Bind `callback` to the pin's line and arm the edge.  Fails with
    /// `AlreadyInUse` when the line already has a callback and
    /// `override_existing` is false.  Returns the line number.
    pub fn attach(
        &self,
        pin: PinDescriptor,
        mode: TriggerMode,
        pull: Pull,
        callback: IrqCallback,
        override_existing: bool,
    ) -> Result<u8> {
        let (physical, line) = Self::line_of(pin)?;
        let _cs = self.gate.enter(&self.hal);

        let previous = self.table.lock(|t| {
            let mut t = t.borrow_mut();
            let b = &mut t[line];
            if b.callback.is_some() && !override_existing {
                return Err(Error::AlreadyInUse("interrupt line"));
            }
            let previous = b.pin.replace(physical);
            b.callback = Some(callback);
            b.mode = mode;
            b.generation = b.generation.wrapping_add(1);
            b.faulted = false;
            Ok(previous)
        })?;

        // Another port's pin may have held this line.
        if let Some(old) = previous.filter(|old| *old != physical) {
            self.hal.detach_interrupt(old);
        }
        self.hal.set_pin_mode(physical, pull.input_mode());
        self.hal.attach_interrupt(physical, line as u8, mode);
        info!("irq: {} bound to EXTI{} ({:?})", physical, line, mode);
        Ok(line as u8)
    }

    /// Re-arm a bound line with a different edge, keeping its callback.
    pub fn set_trigger_mode(&self, pin: PinDescriptor, mode: TriggerMode) -> Result<()> {
        let (physical, line) = Self::line_of(pin)?;
        let _cs = self.gate.enter(&self.hal);
        self.table.lock(|t| {
            let mut t = t.borrow_mut();
            let b = &mut t[line];
            if b.pin != Some(physical) || b.callback.is_none() {
                return Err(Error::NotFound("interrupt binding"));
            }
            b.mode = mode;
            Ok(())
        })?;
        self.hal.attach_interrupt(physical, line as u8, mode);
        Ok(())
    }

    /// Disarm the line and drop its callback.
    pub fn detach(&self, pin: PinDescriptor) -> Result<()> {
        let (physical, line) = Self::line_of(pin)?;
        let _cs = self.gate.enter(&self.hal);
        let callback = self.table.lock(|t| {
            let mut t = t.borrow_mut();
            let b = &mut t[line];
            if b.pin != Some(physical) {
                return Err(Error::NotFound("interrupt binding"));
            }
            b.pin = None;
            b.faulted = false;
            b.generation = b.generation.wrapping_add(1);
            Ok(b.callback.take())
        })?;
        self.hal.detach_interrupt(physical);
        // Dropped outside the table lock.
        drop(callback);
        debug!("irq: EXTI{} detached", line);
        Ok(())
    }

    pub fn line_state(&self, line: u8) -> LineState {
        let idx = usize::from(line);
        if idx >= EXTI_LINES {
            return LineState::Free;
        }
        self.table.lock(|t| {
            let t = t.borrow();
            match (&t[idx].callback, t[idx].faulted) {
                (_, true) => LineState::Faulted,
                (Some(_), false) => LineState::Bound,
                (None, false) => LineState::Free,
            }
        })
    }

    pub fn is_bound(&self, line: u8) -> bool {
        self.line_state(line) == LineState::Bound
    }

    /// Run the callback bound to `line`.  Never propagates a callback
    /// failure; a failing callback is unbound and the failure logged.
    pub fn dispatch(&self, line: u8) -> Dispatch {
        let idx = usize::from(line);
        if idx >= EXTI_LINES {
            return Dispatch::Idle;
        }
        let taken = self.table.lock(|t| {
            let mut t = t.borrow_mut();
            let b = &mut t[idx];
            b.callback.take().map(|cb| (cb, b.generation))
        });
        let Some((mut callback, generation)) = taken else {
            return Dispatch::Idle;
        };

        self.heap.lock();
        let outcome = catch_unwind(AssertUnwindSafe(|| callback(line)));
        self.heap.unlock();

        let failure = match outcome {
            Ok(Ok(())) => {
                self.table.lock(|t| {
                    let mut t = t.borrow_mut();
                    let b = &mut t[idx];
                    // Rebound or detached from inside the callback: keep that.
                    if b.generation == generation && b.callback.is_none() {
                        b.callback = Some(callback);
                    }
                });
                return Dispatch::Handled;
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_owned()),
        };

        self.table.lock(|t| {
            let mut t = t.borrow_mut();
            if t[idx].generation == generation {
                t[idx].faulted = true;
            }
        });
        error!("irq: uncaught failure in EXTI{} handler, handler disabled: {}", line, failure);
        Dispatch::Disabled
    }

    /// Dispatch every line an ISR marked pending.  Returns lines serviced.
    pub fn dispatch_pending(&self, pending: &PendingLines) -> u32 {
        pending.drain(|line| {
            self.dispatch(line);
        })
    }

    /// Script-level `disableAll`.  Nests with the registry's own sections.
    pub fn disable_all(&self) {
        self.gate.disable_all(&self.hal);
    }

    /// Script-level `enableAll`.  `false` when there was nothing to undo.
    pub fn enable_all(&self) -> bool {
        self.gate.enable_all(&self.hal)
    }

    pub fn mask_depth(&self) -> u32 {
        self.gate.depth()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use super::*;
    use crate::adapters::sim::SimInterruptHal;
    use crate::pins::{D4, Port};

    const LINE3: PinDescriptor = PinDescriptor::new(Port::B, 3);

    fn counter() -> (Arc<AtomicU32>, IrqCallback) {
        let hits = Arc::new(AtomicU32::new(0));
        let h = Arc::clone(&hits);
        (hits, Box::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    #[test]
    fn dispatch_invokes_bound_callback_once() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        let (hits, cb) = counter();
        assert_eq!(reg.attach(LINE3, TriggerMode::Rising, Pull::Up, cb, false), Ok(3));
        assert_eq!(reg.hal().attachment(D4), Some((3, TriggerMode::Rising)));
        assert_eq!(reg.hal().pin_mode(D4), Some(crate::pins::PinMode::InputPullUp));

        let line = reg.hal().edge(D4).unwrap();
        assert_eq!(reg.dispatch(line), Dispatch::Handled);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(reg.dispatch(2), Dispatch::Idle);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_callback_disables_itself() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        reg.attach(
            LINE3,
            TriggerMode::Falling,
            Pull::None,
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Err(Error::InvalidState("sensor"))
            }),
            false,
        )
        .unwrap();
        assert_eq!(reg.dispatch(3), Dispatch::Disabled);
        assert_eq!(reg.line_state(3), LineState::Faulted);
        assert_eq!(reg.dispatch(3), Dispatch::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_callback_is_contained() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, Box::new(|_| panic!("boom")), false)
            .unwrap();
        assert_eq!(reg.dispatch(3), Dispatch::Disabled);
        assert_eq!(reg.dispatch(3), Dispatch::Idle);
    }

    #[test]
    fn second_attach_needs_override() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        let (first, cb1) = counter();
        let (second, cb2) = counter();
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, cb1, false).unwrap();
        let (_, cb3) = counter();
        assert_eq!(
            reg.attach(LINE3, TriggerMode::Rising, Pull::None, cb3, false),
            Err(Error::AlreadyInUse("interrupt line"))
        );
        reg.attach(LINE3, TriggerMode::Falling, Pull::None, cb2, true).unwrap();
        reg.dispatch(3);
        assert_eq!((first.load(Ordering::SeqCst), second.load(Ordering::SeqCst)), (0, 1));
    }

    #[test]
    fn faulted_line_accepts_new_attach() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, Box::new(|_| Err(Error::NotFound("x"))), false)
            .unwrap();
        reg.dispatch(3);
        let (hits, cb) = counter();
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, cb, false).unwrap();
        assert_eq!(reg.line_state(3), LineState::Bound);
        reg.dispatch(3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_clears_hardware_and_callback() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        let (hits, cb) = counter();
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, cb, false).unwrap();
        reg.detach(LINE3).unwrap();
        assert_eq!(reg.hal().attachment(D4), None);
        assert_eq!(reg.dispatch(3), Dispatch::Idle);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(reg.detach(LINE3), Err(Error::NotFound("interrupt binding")));
    }

    #[test]
    fn registration_is_bracketed_by_one_mask_pair() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        let (_, cb) = counter();
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, cb, false).unwrap();
        assert_eq!(reg.hal().mask_calls(), (1, 1));
        assert!(!reg.hal().is_masked());
        assert_eq!(reg.mask_depth(), 0);
    }

    #[test]
    fn script_disable_holds_across_registration() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        reg.disable_all();
        let (_, cb) = counter();
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, cb, false).unwrap();
        assert!(reg.hal().is_masked(), "registration must not unmask an outer section");
        assert!(reg.enable_all());
        assert!(!reg.hal().is_masked());
        assert!(!reg.enable_all());
    }

    #[test]
    fn set_trigger_mode_keeps_callback() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        let (hits, cb) = counter();
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, cb, false).unwrap();
        reg.set_trigger_mode(LINE3, TriggerMode::RisingFalling).unwrap();
        assert_eq!(reg.hal().attachment(D4), Some((3, TriggerMode::RisingFalling)));
        reg.dispatch(3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn heap_is_locked_only_during_callback() {
        #[derive(Default)]
        struct CountingHeap {
            locks: AtomicUsize,
            unlocks: AtomicUsize,
        }
        impl HeapLock for &CountingHeap {
            fn lock(&self) {
                self.locks.fetch_add(1, Ordering::SeqCst);
            }
            fn unlock(&self) {
                self.unlocks.fetch_add(1, Ordering::SeqCst);
            }
        }

        let heap = CountingHeap::default();
        let reg = InterruptRegistry::with_heap_lock(SimInterruptHal::new(), &heap);
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, Box::new(|_| panic!("x")), false)
            .unwrap();
        reg.dispatch(3);
        reg.dispatch(3);
        assert_eq!(heap.locks.load(Ordering::SeqCst), 1);
        assert_eq!(heap.unlocks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pending_edges_dispatch_from_main_loop() {
        let reg = InterruptRegistry::new(SimInterruptHal::new());
        let pending = PendingLines::new();
        let (hits, cb) = counter();
        reg.attach(LINE3, TriggerMode::Rising, Pull::None, cb, false).unwrap();
        assert!(reg.hal().edge_into(D4, &pending));
        assert!(reg.hal().edge_into(D4, &pending));
        assert_eq!(reg.dispatch_pending(&pending), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
