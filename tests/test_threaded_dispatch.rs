//! Interrupt delivery from a separate hardware thread.
//!
//! The consumer polls on the test thread while another thread expires the
//! timer and dispatches, the way the host simulation binary runs.

#![cfg(feature = "sim")]

#[allow(clippy::duplicate_mod)]
#[path = "fixtures/mod.rs"]
mod fixtures;

#[allow(clippy::duplicate_mod)]
#[path = "helpers.rs"]
mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use fixtures::{COUNTER, CaptureSink, SIM_LINES, TIMER_LINE};
use irq_tick::BoardParams;
use irq_tick::TimerIrq;
use irq_tick::sim::{SimBoard, SimController};

fn threaded_params(bound: u32) -> BoardParams {
    BoardParams {
        max_idle_spins: Some(200_000),
        ..helpers::params_with_bound(bound)
    }
}

#[test]
fn test_sequence_with_hardware_thread() {
    let board = SimBoard::new(SIM_LINES);
    let timer = TimerIrq::new(5);
    let ctrl: SimController = SimController::new();
    let mut platform = helpers::platform(&board);
    let system = helpers::running(&mut platform, &timer, &ctrl, threaded_params(5));
    let done = AtomicBool::new(false);
    let mut sink = CaptureSink::new();

    let report = thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                helpers::tick(&platform);
                thread::sleep(Duration::from_micros(200));
            }
        });

        let report = system.run_sequence(&mut sink, || thread::sleep(Duration::from_micros(10)));
        done.store(true, Ordering::Release);
        report
    })
    .unwrap();

    assert_eq!(report.last, 5);
    assert_eq!(timer.expiries().get(), 5);

    // Observed values strictly increase and end at the bound
    let observed: Vec<u32> = sink
        .lines()
        .iter()
        .map(|l| l.trim_start_matches("Timer event ").parse().unwrap())
        .collect();
    assert!(observed.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(observed.last(), Some(&5));
    assert_eq!(report.events as usize, observed.len());

    assert_eq!(board.timer.stops(COUNTER), 1);
    assert!(!system.controller().is_connected(TIMER_LINE));
}

#[test]
fn test_polling_never_sees_decrease() {
    let board = SimBoard::new(SIM_LINES);
    let timer = TimerIrq::new(40);
    let ctrl: SimController = SimController::new();
    let mut platform = helpers::platform(&board);
    let _system = helpers::running(&mut platform, &timer, &ctrl, threaded_params(40));
    let done = AtomicBool::new(false);

    let observed = thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..60 {
                helpers::tick(&platform);
                thread::yield_now();
            }
            done.store(true, Ordering::Release);
        });

        let mut observed = Vec::new();
        while !done.load(Ordering::Acquire) {
            observed.push(timer.expiries().get());
        }
        observed.push(timer.expiries().get());
        observed
    });

    helpers::assert_non_decreasing(&observed);
    assert_eq!(observed.last(), Some(&40));
}
