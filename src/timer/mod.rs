//! Hardware timer abstraction for one AXI timer counter.
//!
//! A [`TimerChannel`] owns the register window of its device and drives a
//! single counter through `Initialized -> Configured -> Running -> Stopped`.
//! "Uninitialized" has no value: a channel only exists once
//! [`TimerChannel::new`] accepted the hardware.
//!
//! # Reconfiguring a running channel
//!
//! Both calls are accepted while running:
//! - [`TimerChannel::configure`] takes effect immediately and keeps the
//!   counter enabled. This is how the interrupt handler turns interrupt
//!   generation off without stopping the timer.
//! - [`TimerChannel::set_reload_value`] only updates the load register; the
//!   live counter picks it up at the next reload.

use core::fmt;

use crate::error::{ConfigError, InitError};
use crate::io::RegisterIo;

pub mod regs;

use regs::{COUNTERS_PER_DEVICE, TCR, TCSR, TLR, tcsr};

/// Pattern written by [`TimerChannel::self_test`].
pub const SELF_TEST_PATTERN: u32 = 0xA5A5_A5A5;

// ============================================================================
// Identity and options
// ============================================================================

/// Physical timer resource: device plus counter within the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimerIdentity {
    /// Platform device id of the timer block
    pub device_id: u16,
    /// Counter within the block (0 or 1)
    pub counter: u8,
}

impl TimerIdentity {
    /// Create an identity.
    pub const fn new(device_id: u16, counter: u8) -> Self {
        Self { device_id, counter }
    }
}

/// Counting direction.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "host",
    derive(serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum CountDirection {
    /// Count up from the reload value, expire on rollover (hardware reset default)
    #[default]
    Up,
    /// Count down from the reload value, expire at zero
    Down,
}

impl CountDirection {
    /// Reload value that makes the counter expire after `ticks` ticks.
    ///
    /// Counting up expires on rollover, so the reload is `2^32 - ticks`.
    pub const fn reload_for(self, ticks: u32) -> u32 {
        match self {
            CountDirection::Up => 0u32.wrapping_sub(ticks),
            CountDirection::Down => ticks,
        }
    }

    fn check_reload(self, reload: u32) -> Result<(), ConfigError> {
        match (self, reload) {
            (CountDirection::Down, 0) => Err(ConfigError::ZeroPeriod),
            _ => Ok(()),
        }
    }
}

/// Mode flags programmed by [`TimerChannel::configure`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TimerOptions {
    /// Raise an interrupt on expiry
    pub interrupt: bool,
    /// Reload and keep counting after expiry
    pub auto_reload: bool,
    /// Counting direction
    pub direction: CountDirection,
}

impl TimerOptions {
    /// All options off, counting up.
    pub const fn new() -> Self {
        Self {
            interrupt: false,
            auto_reload: false,
            direction: CountDirection::Up,
        }
    }

    /// Builder method to enable interrupt generation.
    pub const fn with_interrupt(mut self) -> Self {
        self.interrupt = true;
        self
    }

    /// Builder method to disable interrupt generation.
    pub const fn without_interrupt(mut self) -> Self {
        self.interrupt = false;
        self
    }

    /// Builder method to enable auto reload.
    pub const fn with_auto_reload(mut self) -> Self {
        self.auto_reload = true;
        self
    }

    /// Builder method to set the counting direction.
    pub const fn counting(mut self, direction: CountDirection) -> Self {
        self.direction = direction;
        self
    }

    /// TCSR bits for these options.
    pub const fn control_bits(&self) -> u32 {
        let mut bits = 0;
        if self.interrupt {
            bits |= tcsr::ENIT;
        }
        if self.auto_reload {
            bits |= tcsr::ARHT;
        }
        if let CountDirection::Down = self.direction {
            bits |= tcsr::UDT;
        }
        bits
    }
}

/// Number of timer ticks in `period_us` microseconds at `clock_hz`.
///
/// The clock frequency is a fixed board parameter, not measured.
pub fn period_ticks(clock_hz: u32, period_us: u32) -> Result<u32, ConfigError> {
    let ticks = u64::from(clock_hz) * u64::from(period_us) / 1_000_000;
    match ticks {
        0 => Err(ConfigError::ZeroPeriod),
        t if t > u64::from(u32::MAX) => Err(ConfigError::PeriodOutOfRange),
        t => Ok(t as u32),
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Lifecycle state of a channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerState {
    /// Reset and idle, options or reload value still missing
    Initialized,
    /// Options and reload value programmed, not yet started
    Configured,
    /// Counting (auto reload keeps it here)
    Running,
    /// Explicitly stopped
    Stopped,
}

/// One timer counter and its register window.
pub struct TimerChannel<R: RegisterIo> {
    regs: R,
    identity: TimerIdentity,
    options: Option<TimerOptions>,
    reload: Option<u32>,
    state: TimerState,
}

impl<R: RegisterIo> fmt::Debug for TimerChannel<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerChannel")
            .field("identity", &self.identity)
            .field("options", &self.options)
            .field("reload", &self.reload)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<R: RegisterIo> TimerChannel<R> {
    /// Bind to the counter `identity.counter` behind `regs`.
    ///
    /// Fails for a counter the device does not have, or one that is already
    /// enabled. On success the counter is reset: options cleared, pending
    /// expiry acknowledged, load register zeroed.
    pub fn new(mut regs: R, identity: TimerIdentity) -> Result<Self, InitError> {
        if identity.counter >= COUNTERS_PER_DEVICE {
            return Err(InitError::InvalidCounter {
                counter: identity.counter,
            });
        }

        let control = regs::offset(identity.counter, TCSR);
        if regs.read(control) & tcsr::ENT != 0 {
            return Err(InitError::TimerAlreadyRunning);
        }

        regs.write(control, tcsr::TINT);
        regs.write(regs::offset(identity.counter, TLR), 0);

        log::debug!(
            "timer {}/{} initialized",
            identity.device_id,
            identity.counter
        );

        Ok(Self {
            regs,
            identity,
            options: None,
            reload: None,
            state: TimerState::Initialized,
        })
    }

    /// Check that the load and counter registers hold a written value.
    ///
    /// The previous load value is restored afterwards. Refused while running.
    pub fn self_test(&mut self) -> Result<(), InitError> {
        if self.state == TimerState::Running {
            return Err(InitError::TimerAlreadyRunning);
        }

        let saved = self.read(TLR);
        self.write(TLR, SELF_TEST_PATTERN);

        let loaded = self.read(TLR);
        let result = if loaded != SELF_TEST_PATTERN {
            Err(InitError::SelfTestFailed {
                expected: SELF_TEST_PATTERN,
                actual: loaded,
            })
        } else {
            let control = self.control();
            self.write(TCSR, control | tcsr::LOAD);
            let counted = self.read(TCR);
            self.write(TCSR, control);

            if counted == SELF_TEST_PATTERN {
                Ok(())
            } else {
                Err(InitError::SelfTestFailed {
                    expected: SELF_TEST_PATTERN,
                    actual: counted,
                })
            }
        };

        self.write(TLR, saved);
        result
    }

    /// Program the mode flags.
    ///
    /// Takes effect immediately; a running counter stays enabled.
    pub fn configure(&mut self, options: TimerOptions) -> Result<(), ConfigError> {
        if let Some(reload) = self.reload {
            options.direction.check_reload(reload)?;
        }

        self.modify(TCSR, |v| {
            (v & !(tcsr::TINT | tcsr::OPTION_MASK)) | options.control_bits()
        });
        self.options = Some(options);
        self.mark_configured();

        log::debug!("timer options {:?}", options);
        Ok(())
    }

    /// Program the reload value (period in ticks, see [`CountDirection::reload_for`]).
    ///
    /// While running, the new value applies from the next reload on.
    pub fn set_reload_value(&mut self, ticks: u32) -> Result<(), ConfigError> {
        self.options
            .map_or(CountDirection::Up, |o| o.direction)
            .check_reload(ticks)?;

        self.write(TLR, ticks);
        self.reload = Some(ticks);
        self.mark_configured();
        Ok(())
    }

    /// Load the reload value into the counter and enable counting.
    ///
    /// No-op when already running.
    pub fn start(&mut self) -> Result<(), ConfigError> {
        if self.state == TimerState::Running {
            return Ok(());
        }
        if self.options.is_none() || self.reload.is_none() {
            return Err(ConfigError::NotConfigured);
        }

        let control = self.control();
        self.write(TCSR, control | tcsr::LOAD);
        self.write(TCSR, (control & !tcsr::LOAD) | tcsr::ENT);
        self.state = TimerState::Running;

        log::debug!("timer {}/{} started", self.identity.device_id, self.identity.counter);
        Ok(())
    }

    /// Disable counting. Idempotent.
    pub fn stop(&mut self) {
        if self.control() & tcsr::ENT != 0 {
            self.modify(TCSR, |v| v & !(tcsr::TINT | tcsr::ENT));
        }
        if self.state == TimerState::Running {
            self.state = TimerState::Stopped;
            log::debug!("timer {}/{} stopped", self.identity.device_id, self.identity.counter);
        }
    }

    /// Whether the counter has expired since the last check.
    ///
    /// Checking IS acknowledging: a set expiry flag is cleared by this call,
    /// which also drops the interrupt request. Code outside the interrupt
    /// handler that polls this steals the expiry from the handler.
    pub fn is_expired(&mut self) -> bool {
        let status = self.read(TCSR);
        if status & tcsr::TINT == 0 {
            return false;
        }
        self.write(TCSR, status);
        true
    }

    /// Live counter value. Diagnostics only.
    pub fn read_value(&self) -> u32 {
        self.read(TCR)
    }

    /// Turn interrupt generation off, keeping every other option.
    pub fn disable_interrupt(&mut self) -> Result<(), ConfigError> {
        let options = self.options.unwrap_or_default().without_interrupt();
        self.configure(options)
    }

    /// Stop the counter, clear its control register and hand back the window.
    pub fn release(mut self) -> R {
        self.stop();
        self.write(TCSR, tcsr::TINT);
        self.regs
    }

    /// Timer resource this channel drives.
    pub fn identity(&self) -> TimerIdentity {
        self.identity
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Last programmed options.
    pub fn options(&self) -> Option<TimerOptions> {
        self.options
    }

    /// Last programmed reload value.
    pub fn reload_value(&self) -> Option<u32> {
        self.reload
    }

    fn mark_configured(&mut self) {
        if self.state == TimerState::Initialized && self.options.is_some() && self.reload.is_some()
        {
            self.state = TimerState::Configured;
        }
    }

    // TCSR without the write-one-to-clear flag, safe to write back.
    fn control(&self) -> u32 {
        self.read(TCSR) & !tcsr::TINT
    }

    fn read(&self, reg: usize) -> u32 {
        self.regs.read(regs::offset(self.identity.counter, reg))
    }

    fn write(&mut self, reg: usize, value: u32) {
        self.regs
            .write(regs::offset(self.identity.counter, reg), value);
    }

    // Read-modify-write; `f` must not keep TINT set or it clears the flag.
    fn modify(&mut self, reg: usize, f: impl FnOnce(u32) -> u32) {
        self.regs.modify(regs::offset(self.identity.counter, reg), f);
    }
}
