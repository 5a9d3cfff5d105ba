//! Register and diagnostic I/O abstractions.
//!
//! `RegisterIo` is the only way the crate touches timer hardware: a 32-bit
//! read/write window addressed by byte offset from the device base. The
//! base address itself belongs to the platform, never to this crate.
//!
//! `DiagnosticSink` is the line-oriented status output (UART console on a
//! board, stdout on a host). Nothing correctness-related depends on it.

use core::fmt::{self, Write};

/// Maximum length of one formatted diagnostic line. Longer lines are truncated.
pub const MAX_LINE: usize = 96;

/// Memory-mapped register window of one device.
///
/// Implementations perform volatile accesses on hardware. Offsets are byte
/// offsets from the device base and always 4-byte aligned.
pub trait RegisterIo {
    /// Read the 32-bit register at `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write the 32-bit register at `offset`.
    fn write(&mut self, offset: usize, value: u32);

    /// Read-modify-write helper.
    fn modify(&mut self, offset: usize, f: impl FnOnce(u32) -> u32) {
        let value = f(self.read(offset));
        self.write(offset, value);
    }
}

/// Line-oriented text sink for status messages.
///
/// Must not block indefinitely. Output may be dropped.
pub trait DiagnosticSink {
    /// Emit one line (without trailing newline).
    fn write_line(&mut self, line: &str);

    /// Format and emit one line.
    ///
    /// Renders into a fixed `MAX_LINE` buffer; overflowing text is cut off
    /// rather than reported.
    fn write_fmt_line(&mut self, args: fmt::Arguments<'_>) {
        let mut line: heapless::String<MAX_LINE> = heapless::String::new();
        let _ = line.write_fmt(args);
        self.write_line(&line);
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn write_line(&mut self, _line: &str) {}
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;
    use std::string::{String, ToString};
    use std::vec::Vec;

    struct Lines(Vec<String>);

    impl DiagnosticSink for Lines {
        fn write_line(&mut self, line: &str) {
            self.0.push(line.to_string());
        }
    }

    struct Regs([u32; 4]);

    impl RegisterIo for Regs {
        fn read(&self, offset: usize) -> u32 {
            self.0[offset / 4]
        }

        fn write(&mut self, offset: usize, value: u32) {
            self.0[offset / 4] = value;
        }
    }

    #[test]
    fn test_write_fmt_line() {
        let mut sink = Lines(Vec::new());
        sink.write_fmt_line(format_args!("IRQ {}", 7));
        assert_eq!(sink.0, ["IRQ 7"]);
    }

    #[test]
    fn test_write_fmt_line_truncates() {
        let mut sink = Lines(Vec::new());
        let long = "x".repeat(MAX_LINE + 20);
        sink.write_fmt_line(format_args!("{}", long));
        assert!(sink.0[0].len() <= MAX_LINE);
    }

    #[test]
    fn test_modify() {
        let mut regs = Regs([0; 4]);
        regs.write(4, 0b1010);
        regs.modify(4, |v| v | 0b0001);
        assert_eq!(regs.read(4), 0b1011);
    }
}
