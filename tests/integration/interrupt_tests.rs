//! Integration tests for the interrupt registry.
//!
//! Edges are injected through the simulated controller into a pending set,
//! the way the GPIO trampoline delivers them on hardware, then dispatched
//! from the main loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use duoport::adapters::sim::SimInterruptHal;
use duoport::app::bindings;
use duoport::app::script::Value;
use duoport::error::{Error, ErrorKind};
use duoport::interrupts::{Dispatch, InterruptRegistry, IrqCallback, LineState, PendingLines};
use duoport::pins::{D4, D5, PinDescriptor, PinMode, Port, Pull, TriggerMode};

use crate::mock_hw::SharedHeap;

const BUTTON: PinDescriptor = PinDescriptor::new(Port::B, 3);

fn counting(hits: &Arc<AtomicU32>) -> IrqCallback {
    let hits = Arc::clone(hits);
    Box::new(move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

fn panicking() -> IrqCallback {
    Box::new(|_| -> duoport::Result<()> { panic!("boom") })
}

#[test]
fn one_edge_runs_the_callback_once() {
    let reg = InterruptRegistry::new(SimInterruptHal::new());
    let pending = PendingLines::new();
    let hits = Arc::new(AtomicU32::new(0));

    let line = reg.attach(BUTTON, TriggerMode::Falling, Pull::Up, counting(&hits), false).unwrap();
    assert_eq!(line, 3);
    assert_eq!(reg.hal().pin_mode(D4), Some(PinMode::InputPullUp));
    assert_eq!(reg.hal().attachment(D4), Some((3, TriggerMode::Falling)));

    assert!(reg.hal().edge_into(D4, &pending));
    assert_eq!(reg.dispatch_pending(&pending), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Nothing pending: nothing runs.
    assert_eq!(reg.dispatch_pending(&pending), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn second_attach_needs_override() {
    let reg = InterruptRegistry::new(SimInterruptHal::new());
    let first = Arc::new(AtomicU32::new(0));
    let second = Arc::new(AtomicU32::new(0));

    reg.attach(BUTTON, TriggerMode::Falling, Pull::Up, counting(&first), false).unwrap();
    assert_eq!(
        reg.attach(BUTTON, TriggerMode::Rising, Pull::Down, counting(&second), false),
        Err(Error::AlreadyInUse("interrupt line"))
    );
    reg.attach(BUTTON, TriggerMode::Rising, Pull::Down, counting(&second), true).unwrap();
    assert_eq!(reg.hal().attachment(D4), Some((3, TriggerMode::Rising)));

    assert_eq!(reg.dispatch(3), Dispatch::Handled);
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_callback_is_disabled() {
    let reg = InterruptRegistry::new(SimInterruptHal::new());
    let pending = PendingLines::new();
    let runs = Arc::new(AtomicU32::new(0));
    let r = Arc::clone(&runs);

    reg.attach(
        BUTTON,
        TriggerMode::RisingFalling,
        Pull::None,
        Box::new(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            Err(Error::InvalidState("script raised"))
        }),
        false,
    )
    .unwrap();

    assert_eq!(reg.dispatch(3), Dispatch::Disabled);
    assert_eq!(reg.line_state(3), LineState::Faulted);

    // Still armed in hardware, but a second edge runs nothing.
    assert!(reg.hal().edge_into(D4, &pending));
    assert_eq!(reg.dispatch_pending(&pending), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // Re-attaching clears the fault.
    let hits = Arc::new(AtomicU32::new(0));
    reg.attach(BUTTON, TriggerMode::RisingFalling, Pull::None, counting(&hits), true).unwrap();
    assert_eq!(reg.line_state(3), LineState::Bound);
    assert_eq!(reg.dispatch(3), Dispatch::Handled);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_callback_is_contained() {
    let reg = InterruptRegistry::new(SimInterruptHal::new());
    reg.attach(BUTTON, TriggerMode::Falling, Pull::Up, panicking(), false).unwrap();

    assert_eq!(reg.dispatch(3), Dispatch::Disabled);
    assert_eq!(reg.line_state(3), LineState::Faulted);
    assert_eq!(reg.dispatch(3), Dispatch::Idle);
    // The registry keeps working for other lines.
    let hits = Arc::new(AtomicU32::new(0));
    reg.attach(PinDescriptor::new(Port::A, 15), TriggerMode::Rising, Pull::Down, counting(&hits), false)
        .unwrap();
    assert_eq!(reg.hal().attachment(D5), Some((15, TriggerMode::Rising)));
    assert_eq!(reg.dispatch(15), Dispatch::Handled);
}

#[test]
fn callback_runs_with_heap_locked() {
    let heap = SharedHeap::default();
    let reg = InterruptRegistry::with_heap_lock(SimInterruptHal::new(), heap.clone());
    let seen = Arc::new(AtomicU32::new(u32::MAX));
    let (h, s) = (heap.clone(), Arc::clone(&seen));

    reg.attach(
        BUTTON,
        TriggerMode::Falling,
        Pull::Up,
        Box::new(move |_| {
            s.store(h.depth(), Ordering::SeqCst);
            Ok(())
        }),
        false,
    )
    .unwrap();

    assert_eq!(reg.dispatch(3), Dispatch::Handled);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(heap.depth(), 0);
    assert_eq!(heap.locks(), 1);
}

#[test]
fn heap_unlocked_after_failure() {
    let heap = SharedHeap::default();
    let reg = InterruptRegistry::with_heap_lock(SimInterruptHal::new(), heap.clone());
    reg.attach(BUTTON, TriggerMode::Falling, Pull::Up, panicking(), false).unwrap();

    assert_eq!(reg.dispatch(3), Dispatch::Disabled);
    assert_eq!(heap.depth(), 0);
}

#[test]
fn detach_disarms_and_frees_the_line() {
    let reg = InterruptRegistry::new(SimInterruptHal::new());
    let hits = Arc::new(AtomicU32::new(0));
    reg.attach(BUTTON, TriggerMode::Falling, Pull::Up, counting(&hits), false).unwrap();

    assert_eq!(bindings::irq_detach(&reg, BUTTON), Ok(Value::None));
    assert_eq!(reg.hal().attachment(D4), None);
    assert_eq!(reg.line_state(3), LineState::Free);
    assert_eq!(reg.dispatch(3), Dispatch::Idle);

    let err = bindings::irq_detach(&reg, BUTTON).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[test]
fn trigger_mode_change_keeps_callback() {
    let reg = InterruptRegistry::new(SimInterruptHal::new());
    let hits = Arc::new(AtomicU32::new(0));
    assert_eq!(
        reg.set_trigger_mode(BUTTON, TriggerMode::Rising).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    reg.attach(BUTTON, TriggerMode::Falling, Pull::Up, counting(&hits), false).unwrap();
    reg.set_trigger_mode(BUTTON, TriggerMode::RisingFalling).unwrap();
    assert_eq!(reg.hal().attachment(D4), Some((3, TriggerMode::RisingFalling)));
    assert_eq!(reg.dispatch(3), Dispatch::Handled);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn nested_masking_restores_only_at_outermost() {
    let reg = InterruptRegistry::new(SimInterruptHal::new());
    let pending = PendingLines::new();
    let hits = Arc::new(AtomicU32::new(0));
    reg.attach(BUTTON, TriggerMode::Falling, Pull::Up, counting(&hits), false).unwrap();

    bindings::irq_disable_all(&reg).unwrap();
    bindings::irq_disable_all(&reg).unwrap();
    assert_eq!(reg.mask_depth(), 2);
    assert!(!reg.hal().edge_into(D4, &pending));

    assert_eq!(bindings::irq_enable_all(&reg), Ok(Value::Bool(true)));
    assert!(reg.hal().is_masked());
    assert_eq!(bindings::irq_enable_all(&reg), Ok(Value::Bool(true)));
    assert!(!reg.hal().is_masked());

    // Unbalanced enable is ignored.
    assert_eq!(bindings::irq_enable_all(&reg), Ok(Value::Bool(false)));
    assert_eq!(reg.mask_depth(), 0);

    assert!(reg.hal().edge_into(D4, &pending));
    assert_eq!(reg.dispatch_pending(&pending), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn attach_inside_script_mask_keeps_mask() {
    let reg = InterruptRegistry::new(SimInterruptHal::new());
    let hits = Arc::new(AtomicU32::new(0));

    reg.disable_all();
    reg.attach(BUTTON, TriggerMode::Falling, Pull::Up, counting(&hits), false).unwrap();
    assert!(reg.hal().is_masked(), "attach must not unmask an outer section");
    assert_eq!(reg.mask_depth(), 1);
    assert!(reg.enable_all());
    assert!(!reg.hal().is_masked());
}
