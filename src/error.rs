//! Error types for timer, interrupt binding and bring-up operations.
//!
//! Each failure class gets its own enum so callers can tell a missing
//! device from a duplicate binding or a misordered call. [`Error`] wraps
//! all of them so `?` composes across the kinds.

use core::fmt;

use crate::irq::LineId;

/// Resource lookup or hardware self-check failure.
///
/// Fatal during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// No timer register window for this device id
    TimerNotFound {
        /// Requested timer device
        device_id: u16,
    },

    /// Counter number outside the device's counters
    InvalidCounter {
        /// Requested counter
        counter: u8,
    },

    /// Counter was already enabled when bring-up reached it
    TimerAlreadyRunning,

    /// Load/counter register read-back did not match the test pattern
    SelfTestFailed {
        /// Pattern written
        expected: u32,
        /// Value read back
        actual: u32,
    },

    /// No interrupt controller configuration for this device id
    ControllerNotFound {
        /// Requested controller device
        device_id: u16,
    },

    /// Controller hardware refused its configuration
    ControllerRejected,

    /// Controller already has hardware attached
    ControllerInUse,
}

/// Duplicate or invalid interrupt binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    /// Line already has a distinct handler bound
    AlreadyBound {
        /// Offending line
        line: LineId,
    },

    /// Line id beyond what the controller implements
    InvalidLine {
        /// Offending line
        line: LineId,
    },

    /// Binding table capacity exhausted
    TableFull,
}

/// Invalid timer option/period combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `start` before options and reload value were programmed
    NotConfigured,

    /// Count-down reload of zero would expire on every tick
    ZeroPeriod,

    /// Requested interval does not fit the 32-bit counter
    PeriodOutOfRange,
}

/// Call-ordering violation.
///
/// Unreachable with correct bring-up ordering; reported rather than ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Dispatcher was already registered with the exception table
    DispatcherInstalled,

    /// Operation on a line with no binding
    LineNotBound {
        /// Offending line
        line: LineId,
    },

    /// `disconnect` before `disable`
    LineStillEnabled {
        /// Offending line
        line: LineId,
    },

    /// Handler context has no timer channel installed
    TimerNotInstalled,
}

/// Steady-state wait failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// Counter did not advance within the configured spin limit
    NoProgress {
        /// Value the consumer was waiting to move past
        last_observed: u32,
        /// Re-checks performed before giving up
        spins: u32,
    },
}

/// Any failure the crate reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// See [`InitError`]
    Init(InitError),
    /// See [`BindError`]
    Bind(BindError),
    /// See [`ConfigError`]
    Config(ConfigError),
    /// See [`ProtocolError`]
    Protocol(ProtocolError),
    /// See [`WaitError`]
    Wait(WaitError),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::TimerNotFound { device_id } => {
                write!(f, "timer device {} not found", device_id)
            }
            InitError::InvalidCounter { counter } => {
                write!(f, "timer counter {} does not exist", counter)
            }
            InitError::TimerAlreadyRunning => write!(f, "timer already running"),
            InitError::SelfTestFailed { expected, actual } => write!(
                f,
                "timer self-test failed (wrote 0x{:08X}, read 0x{:08X})",
                expected, actual
            ),
            InitError::ControllerNotFound { device_id } => {
                write!(f, "interrupt controller {} not found", device_id)
            }
            InitError::ControllerRejected => {
                write!(f, "interrupt controller rejected configuration")
            }
            InitError::ControllerInUse => write!(f, "interrupt controller already initialized"),
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::AlreadyBound { line } => {
                write!(f, "line {} already has a handler", line)
            }
            BindError::InvalidLine { line } => write!(f, "line {} is out of range", line),
            BindError::TableFull => write!(f, "binding table full"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotConfigured => write!(f, "timer options or reload value not set"),
            ConfigError::ZeroPeriod => write!(f, "zero timer period"),
            ConfigError::PeriodOutOfRange => write!(f, "timer period out of range"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::DispatcherInstalled => write!(f, "dispatcher already installed"),
            ProtocolError::LineNotBound { line } => write!(f, "line {} is not bound", line),
            ProtocolError::LineStillEnabled { line } => {
                write!(f, "line {} must be disabled before disconnect", line)
            }
            ProtocolError::TimerNotInstalled => write!(f, "no timer channel installed"),
        }
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::NoProgress {
                last_observed,
                spins,
            } => write!(
                f,
                "no timer progress past {} after {} checks",
                last_observed, spins
            ),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Init(e) => e.fmt(f),
            Error::Bind(e) => e.fmt(f),
            Error::Config(e) => e.fmt(f),
            Error::Protocol(e) => e.fmt(f),
            Error::Wait(e) => e.fmt(f),
        }
    }
}

impl core::error::Error for InitError {}
impl core::error::Error for BindError {}
impl core::error::Error for ConfigError {}
impl core::error::Error for ProtocolError {}
impl core::error::Error for WaitError {}
impl core::error::Error for Error {}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Error::Init(e)
    }
}

impl From<BindError> for Error {
    fn from(e: BindError) -> Self {
        Error::Bind(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<WaitError> for Error {
    fn from(e: WaitError) -> Self {
        Error::Wait(e)
    }
}
