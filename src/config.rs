//! Board configuration.
//!
//! The `BoardConfig` trait carries board parameters as associated consts,
//! so a firmware image pays nothing for them at runtime. [`BoardParams`] is
//! the value form the bring-up sequencer consumes; it can be built from any
//! `BoardConfig` or, on a host, read from a TOML board file.

use crate::error::ConfigError;
use crate::irq::{LineId, Priority, Trigger};
use crate::timer::{self, CountDirection, TimerIdentity, TimerOptions};

/// Board configuration trait defining timer, interrupt and sequence parameters.
///
/// All values are const (zero runtime cost).
pub trait BoardConfig {
    /// Timer device and counter driving the sequence
    const TIMER: TimerIdentity;

    /// Interrupt controller device id
    const INTC_DEVICE_ID: u16;

    /// Interrupt line the timer is wired to
    const TIMER_LINE: LineId;

    /// Priority programmed for the timer line
    const PRIORITY: Priority;

    /// Trigger type programmed for the timer line
    const TRIGGER: Trigger;

    /// Timer input clock in Hz (fixed by the hardware design, not measured)
    const CLOCK_HZ: u32;

    /// Expiry period in microseconds
    const PERIOD_US: u32;

    /// Counting direction
    const DIRECTION: CountDirection;

    /// Expiries after which the sequence ends
    const EXPIRY_BOUND: u32;

    /// Checks without progress before the consumer gives up (`None` = never)
    const MAX_IDLE_SPINS: Option<u32>;
}

/// ZUBoard 1CG: AXI timer 0 on GIC line 121.
///
/// - 100 MHz timer clock, 1 s period, counting down
/// - Priority 0xA0, rising edge
/// - Sequence ends after 10 expiries, waits without limit
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DefaultConfig;

impl BoardConfig for DefaultConfig {
    const TIMER: TimerIdentity = TimerIdentity::new(0, 0);
    const INTC_DEVICE_ID: u16 = 0;
    const TIMER_LINE: LineId = 121;
    const PRIORITY: Priority = 0xA0;
    const TRIGGER: Trigger = Trigger::RisingEdge;
    const CLOCK_HZ: u32 = 100_000_000;
    const PERIOD_US: u32 = 1_000_000;
    const DIRECTION: CountDirection = CountDirection::Down;
    const EXPIRY_BOUND: u32 = 10;
    const MAX_IDLE_SPINS: Option<u32> = None;
}

/// Software board model: short period, short sequence, bounded waits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SimConfig;

impl BoardConfig for SimConfig {
    const TIMER: TimerIdentity = TimerIdentity::new(0, 0);
    const INTC_DEVICE_ID: u16 = 0;
    const TIMER_LINE: LineId = 121;
    const PRIORITY: Priority = 0xA0;
    const TRIGGER: Trigger = Trigger::RisingEdge;
    const CLOCK_HZ: u32 = 1_000_000;
    const PERIOD_US: u32 = 1_000;
    const DIRECTION: CountDirection = CountDirection::Up;
    const EXPIRY_BOUND: u32 = 3;
    const MAX_IDLE_SPINS: Option<u32> = Some(100_000);
}

/// Board parameters as a runtime value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "host",
    derive(serde::Deserialize),
    serde(default, deny_unknown_fields, rename_all = "kebab-case")
)]
pub struct BoardParams {
    /// Timer device id
    pub timer_device: u16,
    /// Counter within the timer device
    pub timer_counter: u8,
    /// Interrupt controller device id
    pub intc_device: u16,
    /// Timer interrupt line
    pub line: LineId,
    /// Line priority
    pub priority: Priority,
    /// Line trigger type
    pub trigger: Trigger,
    /// Timer clock in Hz
    pub clock_hz: u32,
    /// Period in microseconds
    pub period_us: u32,
    /// Counting direction
    pub direction: CountDirection,
    /// Expiries after which the sequence ends
    pub expiry_bound: u32,
    /// Consumer spin limit
    pub max_idle_spins: Option<u32>,
}

impl BoardParams {
    /// Parameters of board `C`.
    pub const fn from_config<C: BoardConfig>() -> Self {
        Self {
            timer_device: C::TIMER.device_id,
            timer_counter: C::TIMER.counter,
            intc_device: C::INTC_DEVICE_ID,
            line: C::TIMER_LINE,
            priority: C::PRIORITY,
            trigger: C::TRIGGER,
            clock_hz: C::CLOCK_HZ,
            period_us: C::PERIOD_US,
            direction: C::DIRECTION,
            expiry_bound: C::EXPIRY_BOUND,
            max_idle_spins: C::MAX_IDLE_SPINS,
        }
    }

    /// Parse a TOML board file. Missing keys keep their [`DefaultConfig`] value.
    #[cfg(feature = "host")]
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Timer resource.
    pub const fn timer(&self) -> TimerIdentity {
        TimerIdentity::new(self.timer_device, self.timer_counter)
    }

    /// Periodic, interrupting timer in the configured direction.
    pub const fn timer_options(&self) -> TimerOptions {
        TimerOptions::new()
            .with_interrupt()
            .with_auto_reload()
            .counting(self.direction)
    }

    /// Load register value for the configured period and direction.
    pub fn reload_value(&self) -> Result<u32, ConfigError> {
        let ticks = timer::period_ticks(self.clock_hz, self.period_us)?;
        Ok(self.direction.reload_for(ticks))
    }
}

impl Default for BoardParams {
    fn default() -> Self {
        Self::from_config::<DefaultConfig>()
    }
}
