//! Test fixtures for irq-tick integration tests.
//!
//! Provides:
//! - `CaptureSink`: diagnostic sink that records every line
//! - `CountingHandler`: interrupt handler that records its invocations
//! - Board constants shared by the tests

#![allow(dead_code)]

use irq_tick::{DiagnosticSink, InterruptHandler, LineId};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Lines implemented by the simulated controller.
pub const SIM_LINES: u16 = 192;

/// Timer interrupt line used throughout the tests (ZUBoard AXI timer 0).
pub const TIMER_LINE: LineId = 121;

/// Counter of the simulated timer device driving the tests.
pub const COUNTER: u8 = 0;

// ============================================================================
// CaptureSink - Diagnostic Output Capture
// ============================================================================

/// Records every diagnostic line in order.
#[derive(Debug, Default)]
pub struct CaptureSink {
    lines: Vec<String>,
}

impl CaptureSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    /// Lines starting with `prefix`, in order.
    pub fn starting_with(&self, prefix: &str) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| l.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Last line written.
    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}

impl DiagnosticSink for CaptureSink {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

// ============================================================================
// CountingHandler - Interrupt Handler Double
// ============================================================================

/// Counts invocations and remembers the lines it was called for.
#[derive(Debug, Default)]
pub struct CountingHandler {
    hits: AtomicU32,
    lines: Mutex<Vec<LineId>>,
}

impl CountingHandler {
    /// Create a handler with no hits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations so far.
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    /// Lines the handler was invoked for, in order.
    pub fn lines(&self) -> Vec<LineId> {
        self.lines.lock().unwrap().clone()
    }
}

impl InterruptHandler for CountingHandler {
    fn on_interrupt(&self, line: LineId) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.lines.lock().unwrap().push(line);
    }
}
