//! Timer interrupt handler and its context.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;

use crate::error::ProtocolError;
use crate::event::ExpiryCounter;
use crate::io::RegisterIo;
use crate::irq::{InterruptHandler, LineId};
use crate::timer::TimerChannel;

/// Handler context for one timer channel.
///
/// Holds the channel slot, the expiry counter and the bound after which
/// the handler turns interrupt generation off. The channel is reachable
/// from both contexts, so every access goes through a critical section.
///
/// Const-constructible: on a board this is usually a `static`, filled by
/// bring-up via [`install`](Self::install).
pub struct TimerIrq<R: RegisterIo> {
    channel: Mutex<RefCell<Option<TimerChannel<R>>>>,
    expiries: ExpiryCounter,
    bound: u32,
}

impl<R: RegisterIo> fmt::Debug for TimerIrq<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerIrq")
            .field("expiries", &self.expiries.get())
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl<R: RegisterIo> TimerIrq<R> {
    /// Empty context that stops counting at `bound` expiries.
    pub const fn new(bound: u32) -> Self {
        Self {
            channel: Mutex::new(RefCell::new(None)),
            expiries: ExpiryCounter::new(),
            bound,
        }
    }

    /// Place the channel the handler will serve. Returns the previous one.
    pub fn install(&self, channel: TimerChannel<R>) -> Option<TimerChannel<R>> {
        critical_section::with(|cs| self.channel.borrow_ref_mut(cs).replace(channel))
    }

    /// Remove the channel, e.g. to [`release`](TimerChannel::release) it.
    pub fn take(&self) -> Option<TimerChannel<R>> {
        critical_section::with(|cs| self.channel.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the channel inside a critical section.
    pub fn with_channel<T>(
        &self,
        f: impl FnOnce(&mut TimerChannel<R>) -> T,
    ) -> Result<T, ProtocolError> {
        critical_section::with(|cs| {
            self.channel
                .borrow_ref_mut(cs)
                .as_mut()
                .map(f)
                .ok_or(ProtocolError::TimerNotInstalled)
        })
    }

    /// Expiries counted so far.
    pub fn expiries(&self) -> &ExpiryCounter {
        &self.expiries
    }

    /// Count at which interrupt generation is switched off.
    pub fn bound(&self) -> u32 {
        self.bound
    }
}

impl<R: RegisterIo + Send> InterruptHandler for TimerIrq<R> {
    /// Acknowledge the expiry, count it, and at the bound turn interrupt
    /// generation off.
    ///
    /// Never stops the timer or touches the binding; shutdown belongs to
    /// the consumer. Expiries past the bound are acknowledged, not counted.
    fn on_interrupt(&self, line: LineId) {
        let outcome = self.with_channel(|channel| {
            if !channel.is_expired() {
                log::trace!("line {}: timer not expired", line);
                return;
            }
            if self.expiries.get() >= self.bound {
                return;
            }

            let count = self.expiries.increment();
            log::trace!("IRQ {}", count);

            if count >= self.bound {
                if let Err(e) = channel.disable_interrupt() {
                    log::warn!("could not disable timer interrupt: {}", e);
                }
            }
        });

        if outcome.is_err() {
            log::warn!("line {}: interrupt with no timer installed", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portable_atomic::{AtomicU32, Ordering};

    use crate::timer::regs::{TCSR, tcsr};
    use crate::timer::{TimerIdentity, TimerOptions};

    /// Single-counter window shared between the test and the channel.
    #[derive(Default)]
    struct Window([AtomicU32; 4]);

    impl Window {
        fn expire(&self) {
            self.0[0].fetch_or(tcsr::TINT, Ordering::SeqCst);
        }

        fn control(&self) -> u32 {
            self.0[0].load(Ordering::SeqCst)
        }
    }

    impl RegisterIo for &Window {
        fn read(&self, offset: usize) -> u32 {
            self.0[offset / 4].load(Ordering::SeqCst)
        }

        fn write(&mut self, offset: usize, value: u32) {
            if offset == TCSR {
                let flag = self.control() & tcsr::TINT & !value;
                self.0[0].store((value & !tcsr::TINT) | flag, Ordering::SeqCst);
            } else {
                self.0[offset / 4].store(value, Ordering::SeqCst);
            }
        }
    }

    fn running(window: &Window, bound: u32) -> TimerIrq<&Window> {
        let irq = TimerIrq::new(bound);
        let mut channel = TimerChannel::new(window, TimerIdentity::new(0, 0)).unwrap();
        channel
            .configure(TimerOptions::new().with_interrupt().with_auto_reload())
            .unwrap();
        channel.set_reload_value(100).unwrap();
        channel.start().unwrap();
        assert!(irq.install(channel).is_none());
        irq
    }

    #[test]
    fn test_not_installed() {
        let irq = TimerIrq::<&Window>::new(3);
        assert_eq!(
            irq.with_channel(|ch| ch.read_value()),
            Err(ProtocolError::TimerNotInstalled)
        );
        irq.on_interrupt(1);
        assert_eq!(irq.expiries().get(), 0);
    }

    #[test]
    fn test_interrupt_without_expiry() {
        let window = Window::default();
        let irq = running(&window, 3);
        irq.on_interrupt(1);
        assert_eq!(irq.expiries().get(), 0);
    }

    #[test]
    fn test_counts_and_acknowledges() {
        let window = Window::default();
        let irq = running(&window, 3);

        window.expire();
        irq.on_interrupt(1);
        assert_eq!(irq.expiries().get(), 1);
        assert_eq!(window.control() & tcsr::TINT, 0);
        assert_ne!(window.control() & tcsr::ENIT, 0);
    }

    #[test]
    fn test_bound_disables_interrupt_only() {
        let window = Window::default();
        let irq = running(&window, 2);

        for _ in 0..2 {
            window.expire();
            irq.on_interrupt(1);
        }
        assert_eq!(irq.expiries().get(), 2);
        assert_eq!(window.control() & tcsr::ENIT, 0);
        assert_ne!(window.control() & tcsr::ENT, 0);

        // Late expiries are acknowledged but not counted
        window.expire();
        irq.on_interrupt(1);
        assert_eq!(irq.expiries().get(), 2);
        assert_eq!(window.control() & tcsr::TINT, 0);
    }

    #[test]
    fn test_take_releases_channel() {
        let window = Window::default();
        let irq = running(&window, 1);
        let channel = irq.take().unwrap();
        channel.release();
        assert_eq!(window.control(), 0);
        assert!(irq.take().is_none());
    }
}
