//! The running system and the process status it ends with.

use core::fmt;

use crate::bringup::{BringUp, Platform};
use crate::config::BoardParams;
use crate::error::Error;
use crate::event::{EventConsumer, SequenceReport, TimerIrq, WaitPolicy};
use crate::io::{DiagnosticSink, RegisterIo};
use crate::irq::{ExceptionTable, InterruptController, IrqHardware, LineId};

/// Process status reported after the bounded sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// Bring-up and sequence completed
    Success,
    /// A bring-up step or the sequence failed
    Failure,
}

impl ExitStatus {
    /// Conventional process exit code (0 / 1).
    pub const fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }

    /// Whether this is [`ExitStatus::Success`].
    pub const fn is_success(self) -> bool {
        matches!(self, ExitStatus::Success)
    }
}

/// Timer and controller after a successful bring-up.
///
/// Borrows the controller and the handler context. The controller is
/// `Sync` whenever its hardware is `Send`, so the IRQ path on another
/// thread can dispatch while the consumer runs.
pub struct System<'a, 'c, R: RegisterIo, H: IrqHardware, const N: usize = 4> {
    controller: &'c InterruptController<'a, H, N>,
    timer: &'a TimerIrq<R>,
    line: LineId,
    policy: WaitPolicy,
}

impl<R: RegisterIo, H: IrqHardware, const N: usize> fmt::Debug for System<'_, '_, R, H, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("controller", &self.controller)
            .field("timer", &self.timer)
            .field("line", &self.line)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<'a, 'c, R: RegisterIo, H: IrqHardware, const N: usize> System<'a, 'c, R, H, N> {
    /// Assemble a system from brought-up parts.
    pub fn new(
        controller: &'c InterruptController<'a, H, N>,
        timer: &'a TimerIrq<R>,
        line: LineId,
        policy: WaitPolicy,
    ) -> Self {
        Self {
            controller,
            timer,
            line,
            policy,
        }
    }

    /// Interrupt controller.
    pub fn controller(&self) -> &'c InterruptController<'a, H, N> {
        self.controller
    }

    /// Handler context.
    pub fn timer(&self) -> &'a TimerIrq<R> {
        self.timer
    }

    /// Timer interrupt line.
    pub fn line(&self) -> LineId {
        self.line
    }

    /// Consumer over this system's counter and binding.
    pub fn consumer(&self) -> EventConsumer<'_, 'a, R, H, N> {
        EventConsumer::new(self.timer, self.controller, self.line, self.policy)
    }

    /// Run the bounded sequence, calling `idle` between polls.
    pub fn run_sequence(
        &self,
        sink: impl DiagnosticSink,
        mut idle: impl FnMut(),
    ) -> Result<SequenceReport, Error> {
        self.consumer().run_bounded_sequence(sink, &mut idle)
    }
}

/// Bring up the board, run the bounded sequence and report the outcome.
///
/// `idle` gets the platform between polls: a wait-for-interrupt on a
/// board, interrupt delivery in a simulation. Every failure ends in
/// [`ExitStatus::Failure`]; the sink has the details.
pub fn run<'a, 'd, P: Platform<'d>, const N: usize>(
    params: BoardParams,
    vectors: &ExceptionTable,
    platform: &mut P,
    timer: &'a TimerIrq<P::TimerRegs>,
    controller: &'d InterruptController<'a, P::Irq, N>,
    mut sink: impl DiagnosticSink,
    mut idle: impl FnMut(&mut P),
) -> ExitStatus {
    let bring_up = BringUp::new(params, vectors);
    let system = match bring_up.run::<P, N>(platform, timer, controller, &mut sink) {
        Ok(system) => system,
        Err(e) => {
            log::warn!("bring-up aborted: {}", e);
            return conclude(Err(e.cause), sink);
        }
    };

    let result = system.run_sequence(&mut sink, || idle(platform));
    conclude(result, sink)
}

/// Print the final status line for `result` and map it to an [`ExitStatus`].
pub fn conclude(
    result: Result<SequenceReport, Error>,
    mut sink: impl DiagnosticSink,
) -> ExitStatus {
    match result {
        Ok(report) => {
            sink.write_fmt_line(format_args!(
                "Successfully ran timer interrupt sequence ({} events, last {})",
                report.events, report.last
            ));
            ExitStatus::Success
        }
        Err(e) => {
            sink.write_fmt_line(format_args!("Timer interrupt sequence failed: {}", e));
            ExitStatus::Failure
        }
    }
}
