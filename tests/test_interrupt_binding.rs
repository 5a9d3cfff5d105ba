//! Interrupt controller binding tests.
//!
//! Tests line binding rules, delivery gating, teardown ordering and the
//! one-time dispatcher installation.

#![cfg(feature = "sim")]

#[allow(clippy::duplicate_mod)]
#[path = "fixtures/mod.rs"]
mod fixtures;

use fixtures::{COUNTER, CountingHandler, SIM_LINES, TIMER_LINE};
use irq_tick::sim::{SimBoard, SimIntc};
use irq_tick::{
    BindError, ExceptionTable, InitError, InterruptController, ProtocolError, Trigger,
};

type Controller<'a> = InterruptController<'a, &'a SimIntc, 4>;

fn controller(intc: &SimIntc) -> Controller<'_> {
    InterruptController::initialize(intc).unwrap()
}

// ============================================================================
// Binding
// ============================================================================

#[test]
fn test_connect_programs_priority_and_trigger() {
    let intc = SimIntc::new(SIM_LINES);
    let handler = CountingHandler::new();
    let ctrl = controller(&intc);

    ctrl.connect(TIMER_LINE, &handler, 0xA0, Trigger::RisingEdge)
        .unwrap();
    assert_eq!(
        intc.line_config(TIMER_LINE),
        Some((0xA0, Trigger::RisingEdge))
    );
    assert!(ctrl.is_connected(TIMER_LINE));
    assert!(!ctrl.is_enabled(TIMER_LINE));
    assert!(!intc.is_enabled(TIMER_LINE));
}

#[test]
fn test_duplicate_connect_keeps_original() {
    let intc = SimIntc::new(SIM_LINES);
    let original = CountingHandler::new();
    let intruder = CountingHandler::new();
    let ctrl = controller(&intc);

    ctrl.connect(TIMER_LINE, &original, 0xA0, Trigger::RisingEdge)
        .unwrap();
    assert_eq!(
        ctrl.connect(TIMER_LINE, &intruder, 0x10, Trigger::LevelHigh),
        Err(BindError::AlreadyBound { line: TIMER_LINE })
    );

    // The refused bind must not have reprogrammed the line either
    assert_eq!(
        intc.line_config(TIMER_LINE),
        Some((0xA0, Trigger::RisingEdge))
    );

    ctrl.enable(TIMER_LINE).unwrap();
    assert!(intc.raise(TIMER_LINE));
    assert_eq!(ctrl.dispatch(), Some(TIMER_LINE));
    assert_eq!(original.hits(), 1);
    assert_eq!(intruder.hits(), 0);
}

#[test]
fn test_reconnect_same_handler_is_noop() {
    let intc = SimIntc::new(SIM_LINES);
    let handler = CountingHandler::new();
    let ctrl = controller(&intc);

    ctrl.connect(TIMER_LINE, &handler, 0xA0, Trigger::RisingEdge)
        .unwrap();
    ctrl.enable(TIMER_LINE).unwrap();
    assert_eq!(
        ctrl.connect(TIMER_LINE, &handler, 0xA0, Trigger::RisingEdge),
        Ok(())
    );
    assert!(ctrl.is_enabled(TIMER_LINE));
}

#[test]
fn test_line_out_of_range() {
    let intc = SimIntc::new(64);
    let handler = CountingHandler::new();
    let ctrl = controller(&intc);

    assert_eq!(
        ctrl.connect(TIMER_LINE, &handler, 0xA0, Trigger::RisingEdge),
        Err(BindError::InvalidLine { line: TIMER_LINE })
    );
}

#[test]
fn test_rejected_controller() {
    let intc = SimIntc::new(SIM_LINES).rejecting();
    let result = InterruptController::<&SimIntc, 4>::initialize(&intc);
    assert_eq!(result.map(|_| ()), Err(InitError::ControllerRejected));
}

// ============================================================================
// Delivery
// ============================================================================

#[test]
fn test_disabled_line_not_delivered() {
    let intc = SimIntc::new(SIM_LINES);
    let handler = CountingHandler::new();
    let ctrl = controller(&intc);

    ctrl.connect(TIMER_LINE, &handler, 0xA0, Trigger::RisingEdge)
        .unwrap();
    assert!(!intc.raise(TIMER_LINE));
    assert_eq!(ctrl.dispatch(), None);

    ctrl.enable(TIMER_LINE).unwrap();
    ctrl.disable(TIMER_LINE).unwrap();
    assert!(!intc.raise(TIMER_LINE));
    assert_eq!(handler.hits(), 0);
}

#[test]
fn test_spurious_interrupt_acknowledged() {
    let intc = SimIntc::new(SIM_LINES);
    let handler = CountingHandler::new();
    let ctrl = controller(&intc);

    ctrl.connect(TIMER_LINE, &handler, 0xA0, Trigger::RisingEdge)
        .unwrap();
    ctrl.enable(TIMER_LINE).unwrap();

    intc.raise_forced(40);
    intc.raise(TIMER_LINE);
    assert_eq!(ctrl.dispatch(), None);
    assert_eq!(ctrl.dispatch(), Some(TIMER_LINE));
    assert_eq!(ctrl.spurious_count(), 1);
    assert_eq!(intc.eois(), 2);
    assert_eq!(handler.lines(), [TIMER_LINE]);
}

#[test]
fn test_two_lines_routed_separately() {
    let intc = SimIntc::new(SIM_LINES);
    let timer_handler = CountingHandler::new();
    let other_handler = CountingHandler::new();
    let ctrl = controller(&intc);

    ctrl.connect(TIMER_LINE, &timer_handler, 0xA0, Trigger::RisingEdge)
        .unwrap();
    ctrl.connect(90, &other_handler, 0x80, Trigger::LevelHigh)
        .unwrap();
    ctrl.enable(TIMER_LINE).unwrap();
    ctrl.enable(90).unwrap();

    let board_lines = [TIMER_LINE, 90, TIMER_LINE];
    for line in board_lines {
        intc.raise(line);
    }
    while ctrl.dispatch().is_some() {}

    assert_eq!(timer_handler.hits(), 2);
    assert_eq!(other_handler.lines(), [90]);
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_teardown_order_enforced() {
    let intc = SimIntc::new(SIM_LINES);
    let handler = CountingHandler::new();
    let replacement = CountingHandler::new();
    let ctrl = controller(&intc);

    assert_eq!(
        ctrl.enable(TIMER_LINE),
        Err(ProtocolError::LineNotBound { line: TIMER_LINE })
    );
    assert_eq!(
        ctrl.disable(TIMER_LINE),
        Err(ProtocolError::LineNotBound { line: TIMER_LINE })
    );

    ctrl.connect(TIMER_LINE, &handler, 0xA0, Trigger::RisingEdge)
        .unwrap();
    ctrl.enable(TIMER_LINE).unwrap();
    assert_eq!(
        ctrl.disconnect(TIMER_LINE),
        Err(ProtocolError::LineStillEnabled { line: TIMER_LINE })
    );
    assert!(ctrl.is_connected(TIMER_LINE));

    ctrl.disable(TIMER_LINE).unwrap();
    ctrl.disconnect(TIMER_LINE).unwrap();
    assert!(!ctrl.is_connected(TIMER_LINE));
    assert_eq!(intc.disables(), 1);

    // A different handler may take the line once it is free
    assert_eq!(
        ctrl.connect(TIMER_LINE, &replacement, 0xA0, Trigger::RisingEdge),
        Ok(())
    );
}

// ============================================================================
// Dispatcher installation
// ============================================================================

#[test]
fn test_dispatcher_installed_once() {
    let board = SimBoard::new(SIM_LINES);
    let ctrl = controller(&board.intc);
    let mut platform = board.platform(0, 0);
    let vectors = ExceptionTable::new();

    assert_eq!(vectors.install_dispatcher(&mut platform, &ctrl), Ok(()));
    assert_eq!(
        vectors.install_dispatcher(&mut platform, &ctrl),
        Err(ProtocolError::DispatcherInstalled)
    );
    assert_eq!(platform.dispatchers(), 1);
    assert!(platform.exceptions_enabled());
    assert!(vectors.is_installed());
}

#[test]
fn test_no_delivery_before_dispatcher_install() {
    let board = SimBoard::new(SIM_LINES);
    let handler = CountingHandler::new();
    let ctrl = controller(&board.intc);
    let mut platform = board.platform(0, 0);
    let vectors = ExceptionTable::new();

    ctrl.connect(TIMER_LINE, &handler, 0xA0, Trigger::RisingEdge)
        .unwrap();
    ctrl.enable(TIMER_LINE).unwrap();

    // Line enabled but the IRQ vector is not set up yet
    assert!(board.force_pulse(COUNTER, TIMER_LINE));
    assert_eq!(platform.deliver(), 0);
    assert_eq!(handler.hits(), 0);
    assert_eq!(board.intc.pending(), 1);
    assert_eq!(board.intc.eois(), 0);

    // Installing unmasks delivery; the held interrupt is taken once
    vectors.install_dispatcher(&mut platform, &ctrl).unwrap();
    assert_eq!(platform.deliver(), 1);
    assert_eq!(handler.hits(), 1);
    assert_eq!(board.intc.pending(), 0);
}
