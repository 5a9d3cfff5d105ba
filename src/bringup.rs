//! Ordered bring-up of timer, interrupt controller and dispatcher.
//!
//! Steps run in a fixed order and the first failure aborts the rest. There
//! is no rollback: a failed bring-up ends the program.

use core::fmt;

use crate::config::BoardParams;
use crate::error::{Error, InitError};
use crate::event::{TimerIrq, WaitPolicy};
use crate::io::{DiagnosticSink, RegisterIo};
use crate::irq::{ExceptionCpu, ExceptionTable, InterruptController, IrqHardware};
use crate::system::System;
use crate::timer::TimerChannel;

/// Board services the sequencer needs.
///
/// Also the CPU exception seam, so the dispatcher can be installed. `'d`
/// is how long the platform keeps the registered dispatcher.
pub trait Platform<'d>: ExceptionCpu<'d> {
    /// Register window of a timer device
    type TimerRegs: RegisterIo + Send;

    /// Interrupt controller hardware
    type Irq: IrqHardware + Send;

    /// Look up the timer device `device_id`.
    fn timer_registers(&mut self, device_id: u16) -> Option<Self::TimerRegs>;

    /// Look up the interrupt controller `device_id`.
    fn interrupt_controller(&mut self, device_id: u16) -> Option<Self::Irq>;
}

/// Bring-up steps, in execution order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    /// Look up and reset the timer counter
    InitTimer,
    /// Timer register self-test
    SelfTest,
    /// Look up and initialize the interrupt controller
    InitController,
    /// Bind the timer handler to its line
    Connect,
    /// Enable the timer line
    EnableLine,
    /// Install the dispatcher and enable exceptions
    InstallDispatcher,
    /// Program timer options
    ConfigureTimer,
    /// Program the reload value
    SetReload,
    /// Start the timer
    StartTimer,
}

impl Step {
    /// All steps in execution order.
    pub const ALL: [Step; 9] = [
        Step::InitTimer,
        Step::SelfTest,
        Step::InitController,
        Step::Connect,
        Step::EnableLine,
        Step::InstallDispatcher,
        Step::ConfigureTimer,
        Step::SetReload,
        Step::StartTimer,
    ];

    /// Stable human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Step::InitTimer => "timer init",
            Step::SelfTest => "timer self-test",
            Step::InitController => "interrupt controller init",
            Step::Connect => "handler connect",
            Step::EnableLine => "line enable",
            Step::InstallDispatcher => "dispatcher install",
            Step::ConfigureTimer => "timer configure",
            Step::SetReload => "timer reload value",
            Step::StartTimer => "timer start",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bring-up failure: which step, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringUpError {
    /// Step that failed
    pub step: Step,
    /// Underlying failure
    pub cause: Error,
}

impl fmt::Display for BringUpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.cause)
    }
}

impl core::error::Error for BringUpError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Bring-up sequencer for one board.
#[derive(Debug)]
pub struct BringUp<'v> {
    params: BoardParams,
    vectors: &'v ExceptionTable,
}

impl<'v> BringUp<'v> {
    /// Sequencer for `params`, installing the dispatcher into `vectors`.
    pub fn new(params: BoardParams, vectors: &'v ExceptionTable) -> Self {
        Self { params, vectors }
    }

    /// Board parameters in use.
    pub fn params(&self) -> &BoardParams {
        &self.params
    }

    /// Run every step in order and hand back the running system.
    ///
    /// `timer` is the handler context the line gets bound to. Its bound
    /// should match [`BoardParams::expiry_bound`]; the context wins if not.
    /// `controller` receives the controller hardware and becomes the CPU's
    /// IRQ dispatcher, so it has to outlive the platform's use of it.
    pub fn run<'a, 'd, P: Platform<'d>, const N: usize>(
        &self,
        platform: &mut P,
        timer: &'a TimerIrq<P::TimerRegs>,
        controller: &'d InterruptController<'a, P::Irq, N>,
        mut sink: impl DiagnosticSink,
    ) -> Result<System<'a, 'd, P::TimerRegs, P::Irq, N>, BringUpError> {
        let params = &self.params;
        let identity = params.timer();

        sink.write_fmt_line(format_args!(
            "Timer interrupt bring-up: timer {}/{}, line {}, controller {}",
            identity.device_id, identity.counter, params.line, params.intc_device
        ));
        if timer.bound() != params.expiry_bound {
            log::warn!(
                "handler bound {} overrides configured bound {}",
                timer.bound(),
                params.expiry_bound
            );
            sink.write_fmt_line(format_args!(
                "warning: handler bound {} overrides configured bound {}",
                timer.bound(),
                params.expiry_bound
            ));
        }

        let mut channel = step(&mut sink, Step::InitTimer, || {
            let regs = platform
                .timer_registers(identity.device_id)
                .ok_or(InitError::TimerNotFound {
                    device_id: identity.device_id,
                })?;
            TimerChannel::new(regs, identity)
        })?;

        step(&mut sink, Step::SelfTest, || channel.self_test())?;

        step(&mut sink, Step::InitController, || {
            let hw = platform
                .interrupt_controller(params.intc_device)
                .ok_or(InitError::ControllerNotFound {
                    device_id: params.intc_device,
                })?;
            controller.attach(hw)
        })?;

        step(&mut sink, Step::Connect, || {
            controller.connect(params.line, timer, params.priority, params.trigger)
        })?;

        step(&mut sink, Step::EnableLine, || controller.enable(params.line))?;

        if self.vectors.is_installed() {
            log::info!("dispatcher already installed, skipping");
            sink.write_fmt_line(format_args!("{}: already done", Step::InstallDispatcher));
        } else {
            step(&mut sink, Step::InstallDispatcher, || {
                self.vectors.install_dispatcher(platform, controller)
            })?;
        }

        step(&mut sink, Step::ConfigureTimer, || {
            channel.configure(params.timer_options())
        })?;

        step(&mut sink, Step::SetReload, || {
            let reload = params.reload_value()?;
            channel.set_reload_value(reload)
        })?;

        if let Some(previous) = timer.install(channel) {
            log::warn!("replaced timer channel {:?}", previous.identity());
            previous.release();
        }

        step(&mut sink, Step::StartTimer, || -> Result<(), Error> {
            timer.with_channel(|channel| channel.start())??;
            Ok(())
        })?;

        let policy = WaitPolicy {
            max_spins: params.max_idle_spins,
        };
        Ok(System::new(controller, timer, params.line, policy))
    }
}

// Run one step, report it on the sink and tag a failure with the step.
fn step<T, E: Into<Error>>(
    sink: &mut impl DiagnosticSink,
    step: Step,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, BringUpError> {
    match f() {
        Ok(value) => {
            log::info!("{}: ok", step);
            sink.write_fmt_line(format_args!("{}: ok", step));
            Ok(value)
        }
        Err(e) => {
            let error = BringUpError {
                step,
                cause: e.into(),
            };
            log::info!("{}", error);
            sink.write_fmt_line(format_args!("{}", error));
            Err(error)
        }
    }
}
