//! # irq-tick
//!
//! Periodic hardware timer interrupts for bare-metal systems, with zero heap
//! allocation.
//!
//! **Key pieces:**
//! - **Timer channel** - one AXI timer counter behind a register window trait
//! - **Interrupt binding** - line-to-handler table with strict bind/enable/teardown ordering
//! - **Handler context** - acknowledges expiries, counts them, stops interrupting at a bound
//! - **Event consumer** - main-line polling of the expiry counter, owns shutdown
//! - **Bring-up** - ordered, abort-on-first-failure initialization
//!
//! ```text
//! timer ──irq──> controller.dispatch() ──> TimerIrq ──counter──> EventConsumer
//! ```
//!
//! ## Optional Features
//!
//! - `sim` (default) - software model of the timer and interrupt controller
//! - `async` - cooperative async consumer
//! - `host` - std simulation binary with TOML board files
//!
//! This library is `no_std` compatible.

#![no_std]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

// ============================================================================
// Module Declarations
// ============================================================================

pub mod config;
pub mod error;
pub mod io;

pub mod irq;
pub mod timer;

pub mod event;

pub mod bringup;
pub mod system;

#[cfg(feature = "sim")]
pub mod sim;

// ============================================================================
// Re-exports - Public API
// ============================================================================

// Configuration
pub use config::{BoardConfig, BoardParams, DefaultConfig, SimConfig};

// Error types
pub use error::{BindError, ConfigError, Error, InitError, ProtocolError, WaitError};

// I/O seams
pub use io::{DiagnosticSink, NullSink, RegisterIo};

// Hardware
pub use irq::{
    Dispatch, ExceptionCpu, ExceptionTable, InterruptController, InterruptHandler,
    IrqHardware, LineId, Priority, Trigger,
};
pub use timer::{CountDirection, TimerChannel, TimerIdentity, TimerOptions, TimerState};

// Events
pub use event::{EventConsumer, ExpiryCounter, Idle, SequenceReport, SpinIdle, TimerIrq, WaitPolicy};

// Orchestration
pub use bringup::{BringUp, BringUpError, Platform, Step};
pub use system::{ExitStatus, System};

// ============================================================================
// Library Metadata
// ============================================================================

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
