//! AXI timer register layout.
//!
//! Each device carries two counters. Every counter has its own
//! control/status, load and counter register, `COUNTER_STRIDE` bytes apart.

/// Counters implemented per device.
pub const COUNTERS_PER_DEVICE: u8 = 2;

/// Byte distance between the register blocks of counter 0 and counter 1.
pub const COUNTER_STRIDE: usize = 0x10;

/// Control/status register
pub const TCSR: usize = 0x00;

/// Load register (reload value)
pub const TLR: usize = 0x04;

/// Counter register (live value)
pub const TCR: usize = 0x08;

/// Control/status register bits.
pub mod tcsr {
    /// Count down when set, up when clear
    pub const UDT: u32 = 1 << 1;
    /// Auto reload on expiry
    pub const ARHT: u32 = 1 << 4;
    /// Load TLR into TCR
    pub const LOAD: u32 = 1 << 5;
    /// Interrupt enable
    pub const ENIT: u32 = 1 << 6;
    /// Counter enable
    pub const ENT: u32 = 1 << 7;
    /// Interrupt flag (write one to clear)
    pub const TINT: u32 = 1 << 8;

    /// Bits owned by `configure`
    pub const OPTION_MASK: u32 = UDT | ARHT | ENIT;
}

/// Byte offset of `reg` for `counter`.
pub const fn offset(counter: u8, reg: usize) -> usize {
    counter as usize * COUNTER_STRIDE + reg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        assert_eq!(offset(0, TCSR), 0x00);
        assert_eq!(offset(0, TCR), 0x08);
        assert_eq!(offset(1, TCSR), 0x10);
        assert_eq!(offset(1, TLR), 0x14);
    }
}
