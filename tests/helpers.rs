//! Shared test helpers to reduce duplication across integration tests.

#![cfg(feature = "sim")]
#![allow(dead_code)]

#[allow(clippy::duplicate_mod)]
#[path = "fixtures/mod.rs"]
mod fixtures;

use fixtures::{COUNTER, TIMER_LINE};
use irq_tick::sim::{SimBoard, SimController, SimIntc, SimPlatform, SimTimer};
use irq_tick::{
    BoardConfig, BoardParams, BringUp, BringUpError, DiagnosticSink, ExceptionTable, NullSink,
    SimConfig, System, TimerIrq,
};

/// System brought up on a simulated board.
pub type SimSystem<'b> = System<'b, 'b, &'b SimTimer, &'b SimIntc>;

// ============================================================================
// Parameter Helpers
// ============================================================================

/// Simulation board parameters.
pub fn sim_params() -> BoardParams {
    BoardParams::from_config::<SimConfig>()
}

/// Simulation board parameters ending the sequence after `bound` expiries.
pub fn params_with_bound(bound: u32) -> BoardParams {
    BoardParams {
        expiry_bound: bound,
        ..sim_params()
    }
}

// ============================================================================
// Bring-up Helpers
// ============================================================================

/// Platform exposing `board`'s devices under the simulation config's ids.
pub fn platform(board: &SimBoard) -> SimPlatform<'_> {
    board.platform(SimConfig::TIMER.device_id, SimConfig::INTC_DEVICE_ID)
}

/// Bring up `platform` with `params`, binding `timer` to the timer line.
pub fn bring_up<'b>(
    platform: &mut SimPlatform<'b>,
    timer: &'b TimerIrq<&'b SimTimer>,
    controller: &'b SimController<'b, 'b>,
    params: BoardParams,
    sink: impl DiagnosticSink,
) -> Result<SimSystem<'b>, BringUpError> {
    let vectors = ExceptionTable::new();
    BringUp::new(params, &vectors).run::<_, 4>(platform, timer, controller, sink)
}

/// Bring up and unwrap, for tests that only care about steady state.
pub fn running<'b>(
    platform: &mut SimPlatform<'b>,
    timer: &'b TimerIrq<&'b SimTimer>,
    controller: &'b SimController<'b, 'b>,
    params: BoardParams,
) -> SimSystem<'b> {
    bring_up(platform, timer, controller, params, NullSink).expect("bring-up failed")
}

/// One timer period on the default counter and line, taken as an IRQ.
pub fn tick(platform: &SimPlatform<'_>) -> u32 {
    platform.tick(COUNTER, TIMER_LINE)
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert `values` never decreases.
pub fn assert_non_decreasing(values: &[u32]) {
    for pair in values.windows(2) {
        assert!(pair[0] <= pair[1], "counter went backwards: {:?}", values);
    }
}

/// Expected "Timer event N" lines for `values`.
pub fn event_lines(values: &[u32]) -> Vec<String> {
    values.iter().map(|v| format!("Timer event {}", v)).collect()
}
