//! Host simulation of the timer interrupt sequence.
//!
//! Runs bring-up and the bounded expiry sequence against the software board
//! model, with a hardware thread expiring the timer once per period and
//! delivering the interrupt.
//!
//! ```bash
//! cargo run --features host --bin irq-tick-sim -- [board.toml]
//! ```
//!
//! Without a board file the simulation board parameters are used. Set
//! `IRQ_TICK_LOG` to `trace`, `debug`, `info` or `warn` for library logs.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use irq_tick::sim::{SimBoard, SimController};
use irq_tick::system::{ExitStatus, conclude};
use irq_tick::{BoardParams, BringUp, DiagnosticSink, ExceptionTable, SimConfig, TimerIrq};

/// Lines implemented by the simulated controller.
const SIM_LINES: u16 = 192;

/// Interval between two consumer checks.
const POLL: Duration = Duration::from_micros(50);

static VECTORS: ExceptionTable = ExceptionTable::new();

// =============================================================================
// Output
// =============================================================================

struct Stdout;

impl DiagnosticSink for Stdout {
    fn write_line(&mut self, line: &str) {
        println!("{}", line);
    }
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging() {
    let level = std::env::var("IRQ_TICK_LOG")
        .ok()
        .and_then(|v| v.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Off);

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

// =============================================================================
// Board file
// =============================================================================

fn load_params(path: Option<String>) -> Result<BoardParams, String> {
    let Some(path) = path else {
        return Ok(BoardParams::from_config::<SimConfig>());
    };

    let text = std::fs::read_to_string(&path).map_err(|e| format!("{}: {}", path, e))?;
    BoardParams::from_toml(&text).map_err(|e| format!("{}: {}", path, e))
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    init_logging();

    let params = match load_params(std::env::args().nth(1)) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("irq-tick-sim: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let board = SimBoard::new(SIM_LINES);
    let timer = TimerIrq::new(params.expiry_bound);
    let controller: SimController = SimController::new();
    let mut platform = board.platform(params.timer_device, params.intc_device);
    let mut sink = Stdout;

    let bring_up = BringUp::new(params, &VECTORS);
    let system = match bring_up.run::<_, 4>(&mut platform, &timer, &controller, &mut sink) {
        Ok(system) => system,
        Err(e) => return exit(conclude(Err(e.cause), &mut sink)),
    };

    let period = Duration::from_micros(u64::from(params.period_us));
    let done = AtomicBool::new(false);

    let status = std::thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                std::thread::sleep(period);
                platform.tick(params.timer_counter, params.line);
            }
        });

        let result = system.run_sequence(&mut sink, || std::thread::sleep(POLL));
        done.store(true, Ordering::Release);
        conclude(result, &mut sink)
    });

    log::debug!(
        "{} spurious interrupts, {} end-of-interrupt signals",
        controller.spurious_count(),
        board.intc.eois()
    );
    exit(status)
}

fn exit(status: ExitStatus) -> ExitCode {
    ExitCode::from(status.code())
}
