//! CPU exception vector registration.
//!
//! The controller's [`dispatch`](super::InterruptController::dispatch)
//! routine must be reached from the CPU's IRQ exception. The platform owns
//! the actual vector and is handed the routine as a [`Dispatch`] entry;
//! [`ExceptionTable`] makes sure that happens once per process, before
//! exception delivery is turned on.

use portable_atomic::{AtomicBool, Ordering};

use super::LineId;
use crate::error::ProtocolError;

/// Top-level interrupt routine the IRQ vector calls.
pub trait Dispatch: Sync {
    /// Serve one pending line; returns the line whose handler ran.
    fn dispatch(&self) -> Option<LineId>;
}

/// CPU side of exception handling.
///
/// `'d` is how long a registered dispatcher stays valid: `'static` for a
/// controller in a `static`, shorter on a host.
pub trait ExceptionCpu<'d> {
    /// Route IRQ exceptions to `dispatcher`.
    fn register_dispatcher(&mut self, dispatcher: &'d dyn Dispatch);

    /// Unmask exception delivery globally.
    fn enable_exceptions(&mut self);
}

/// Process-wide record of the installed dispatcher.
///
/// Const-constructible so it can live in a `static`.
#[derive(Debug)]
pub struct ExceptionTable {
    installed: AtomicBool,
}

impl ExceptionTable {
    /// Empty table.
    pub const fn new() -> Self {
        Self {
            installed: AtomicBool::new(false),
        }
    }

    /// Register `dispatcher` for IRQs, then enable exception delivery.
    ///
    /// Calling this twice is a logic error and reported as
    /// [`ProtocolError::DispatcherInstalled`]; the CPU is not touched again.
    pub fn install_dispatcher<'d, C: ExceptionCpu<'d> + ?Sized>(
        &self,
        cpu: &mut C,
        dispatcher: &'d dyn Dispatch,
    ) -> Result<(), ProtocolError> {
        if self.installed.swap(true, Ordering::AcqRel) {
            return Err(ProtocolError::DispatcherInstalled);
        }

        cpu.register_dispatcher(dispatcher);
        cpu.enable_exceptions();

        log::debug!("irq dispatcher installed, exceptions enabled");
        Ok(())
    }

    /// Whether [`install_dispatcher`](Self::install_dispatcher) already ran.
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }
}

impl Default for ExceptionTable {
    fn default() -> Self {
        Self::new()
    }
}
