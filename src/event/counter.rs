//! Expiry counter shared between interrupt and main-line context.

use portable_atomic::{AtomicU32, Ordering};

/// Monotonic count of acknowledged timer expiries.
///
/// Only the interrupt handler increments it and nothing ever decrements
/// it. The consumer keeps its own "last observed" copy.
///
/// Atomicity: the count is a single 32-bit word. On cores with native
/// atomic read-modify-write the increment is one instruction sequence the
/// main line cannot split; elsewhere `portable-atomic` wraps it in a
/// critical section. Either way a poll sees every increment that
/// completed before it.
///
/// Outside the crate the counter is read-only:
///
/// ```compile_fail
/// let counter = irq_tick::ExpiryCounter::new();
/// counter.increment();
/// ```
#[derive(Debug, Default)]
pub struct ExpiryCounter {
    value: AtomicU32,
}

impl ExpiryCounter {
    /// Counter at zero.
    pub const fn new() -> Self {
        Self {
            value: AtomicU32::new(0),
        }
    }

    /// Record one expiry and return the new count.
    pub(crate) fn increment(&self) -> u32 {
        self.value.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Current count.
    pub fn get(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment() {
        let counter = ExpiryCounter::new();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_concurrent_increments() {
        extern crate std;

        static COUNTER: ExpiryCounter = ExpiryCounter::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        COUNTER.increment();
                    }
                });
            }
        });
        assert_eq!(COUNTER.get(), 4000);
    }
}
