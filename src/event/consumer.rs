//! Main-line consumer of timer expiries.
//!
//! There is no scheduler to block on, so waiting is a re-check loop: read
//! the counter, compare with the last observed value, idle, repeat. The
//! [`Idle`] hook decides what "idle" means (a spin hint on hardware, a
//! `wfi`, or a test driving the simulated board).

use core::fmt;

use crate::error::{Error, WaitError};
use crate::event::TimerIrq;
use crate::io::{DiagnosticSink, RegisterIo};
use crate::irq::{InterruptController, IrqHardware, LineId};

/// What the consumer does between two checks of the counter.
pub trait Idle {
    /// Called once per unsuccessful check.
    fn idle(&mut self);
}

/// Busy-wait with a CPU spin hint.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SpinIdle;

impl Idle for SpinIdle {
    fn idle(&mut self) {
        core::hint::spin_loop();
    }
}

impl<F: FnMut()> Idle for F {
    fn idle(&mut self) {
        self()
    }
}

/// Bound on how long a wait may go without progress.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Unsuccessful checks before giving up; `None` waits forever
    pub max_spins: Option<u32>,
}

impl WaitPolicy {
    /// Wait forever. Only sound when the timer is known to be periodic.
    pub const fn unbounded() -> Self {
        Self { max_spins: None }
    }

    /// Give up after `max_spins` checks without progress.
    pub const fn spin_limit(max_spins: u32) -> Self {
        Self {
            max_spins: Some(max_spins),
        }
    }

    fn exhausted(&self, spins: u32) -> bool {
        self.max_spins.is_some_and(|max| spins >= max)
    }
}

/// Outcome of a completed bounded sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SequenceReport {
    /// Counter changes the consumer observed
    pub events: u32,
    /// Final counter value
    pub last: u32,
}

/// Polls the expiry counter of one [`TimerIrq`] and owns shutdown.
pub struct EventConsumer<'s, 'a, R: RegisterIo, H: IrqHardware, const N: usize> {
    timer: &'s TimerIrq<R>,
    controller: &'s InterruptController<'a, H, N>,
    line: LineId,
    policy: WaitPolicy,
}

impl<R: RegisterIo, H: IrqHardware, const N: usize> fmt::Debug for EventConsumer<'_, '_, R, H, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventConsumer")
            .field("timer", &self.timer)
            .field("line", &self.line)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<'s, 'a, R: RegisterIo, H: IrqHardware, const N: usize> EventConsumer<'s, 'a, R, H, N> {
    /// Consumer for `timer`, whose interrupt is bound to `line` on `controller`.
    pub fn new(
        timer: &'s TimerIrq<R>,
        controller: &'s InterruptController<'a, H, N>,
        line: LineId,
        policy: WaitPolicy,
    ) -> Self {
        Self {
            timer,
            controller,
            line,
            policy,
        }
    }

    /// Current counter value.
    pub fn current(&self) -> u32 {
        self.timer.expiries().get()
    }

    /// Wait until the counter moves past `last` and return the new value.
    ///
    /// The counter may have advanced by more than one since `last`.
    pub fn wait_for_next_event(&self, last: u32, idle: &mut impl Idle) -> Result<u32, WaitError> {
        let mut spins = 0u32;
        loop {
            if let Some(now) = self.check(last, spins)? {
                return Ok(now);
            }
            idle.idle();
            spins = spins.saturating_add(1);
        }
    }

    /// Wait for events until the handler's bound is reached, then shut down.
    ///
    /// Writes one line per observed change to `sink`. Shutdown stops the
    /// timer, disables the line and disconnects it, once.
    pub fn run_bounded_sequence(
        &self,
        mut sink: impl DiagnosticSink,
        idle: &mut impl Idle,
    ) -> Result<SequenceReport, Error> {
        let bound = self.timer.bound();
        let mut report = SequenceReport { events: 0, last: 0 };

        while report.last < bound {
            let now = match self.wait_for_next_event(report.last, idle) {
                Ok(now) => now,
                Err(e) => {
                    self.abandon();
                    return Err(e.into());
                }
            };
            report = self.observe(&mut sink, report, now);
        }

        self.shutdown()?;
        Ok(report)
    }

    // One check: `Some(now)` on progress, error when out of patience.
    fn check(&self, last: u32, spins: u32) -> Result<Option<u32>, WaitError> {
        let now = self.current();
        if now != last {
            return Ok(Some(now));
        }
        if self.policy.exhausted(spins) {
            return Err(WaitError::NoProgress {
                last_observed: last,
                spins,
            });
        }
        Ok(None)
    }

    fn observe(
        &self,
        sink: &mut impl DiagnosticSink,
        report: SequenceReport,
        now: u32,
    ) -> SequenceReport {
        if now > report.last + 1 {
            log::debug!("counter jumped from {} to {}", report.last, now);
        }
        sink.write_fmt_line(format_args!("Timer event {}", now));
        SequenceReport {
            events: report.events + 1,
            last: now,
        }
    }

    fn shutdown(&self) -> Result<(), Error> {
        self.timer.with_channel(|channel| channel.stop())?;
        self.controller.disable(self.line)?;
        self.controller.disconnect(self.line)?;
        log::info!("sequence complete, line {} released", self.line);
        Ok(())
    }

    // Best effort after a failed wait; the wait error is what gets reported.
    fn abandon(&self) {
        if let Err(e) = self.shutdown() {
            log::warn!("shutdown after failed wait: {}", e);
        }
    }
}

#[cfg(feature = "async")]
impl<R: RegisterIo, H: IrqHardware, const N: usize> EventConsumer<'_, '_, R, H, N> {
    /// Resolve once the counter moves past `last`.
    ///
    /// Cooperative: every pending poll wakes itself, so the executor keeps
    /// re-checking while other tasks get to run in between. The spin limit
    /// counts polls.
    pub async fn next_event(&self, last: u32) -> Result<u32, WaitError> {
        use core::task::Poll;

        let mut spins = 0u32;
        core::future::poll_fn(|cx| match self.check(last, spins) {
            Ok(Some(now)) => Poll::Ready(Ok(now)),
            Err(e) => Poll::Ready(Err(e)),
            Ok(None) => {
                spins = spins.saturating_add(1);
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await
    }

    /// Async form of [`run_bounded_sequence`](Self::run_bounded_sequence).
    pub async fn run_bounded_sequence_async(
        &self,
        mut sink: impl DiagnosticSink,
    ) -> Result<SequenceReport, Error> {
        let bound = self.timer.bound();
        let mut report = SequenceReport { events: 0, last: 0 };

        while report.last < bound {
            let now = match self.next_event(report.last).await {
                Ok(now) => now,
                Err(e) => {
                    self.abandon();
                    return Err(e.into());
                }
            };
            report = self.observe(&mut sink, report, now);
        }

        self.shutdown()?;
        Ok(report)
    }
}
