//! Interrupt controller binding.
//!
//! [`InterruptController`] keeps a fixed-size table of line bindings and
//! routes acknowledged lines to their handler. The controller hardware
//! (distributor/CPU interface registers) sits behind [`IrqHardware`].
//!
//! Handlers are `&dyn InterruptHandler` values that own their context, so
//! no untyped context pointer travels with the binding. All methods take
//! `&self`: the controller is shared between main-line code (bind, enable,
//! teardown) and interrupt context (dispatch). Table and hardware access
//! happen inside a critical section; the handler itself runs outside it.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use portable_atomic::{AtomicU32, Ordering};

use crate::error::{BindError, InitError, ProtocolError};

pub mod vector;

pub use vector::{Dispatch, ExceptionCpu, ExceptionTable};

/// Interrupt line id, as numbered by the controller.
pub type LineId = u16;

/// Interrupt priority (lower value = more urgent on GIC-style controllers).
pub type Priority = u8;

/// Signal type of an interrupt line.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "host",
    derive(serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum Trigger {
    /// Active-high level sensitive
    LevelHigh = 0x1,
    /// Rising-edge sensitive
    RisingEdge = 0x3,
}

impl Trigger {
    /// Controller encoding of this trigger type.
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Interrupt handler invoked by [`InterruptController::dispatch`].
///
/// Runs in interrupt context: no blocking, no unbounded loops, no teardown
/// of the binding it was called through.
pub trait InterruptHandler: Sync {
    /// Handle one interrupt on `line`.
    fn on_interrupt(&self, line: LineId);
}

/// Interrupt controller hardware.
pub trait IrqHardware {
    /// Apply the controller's base configuration.
    fn initialize(&mut self) -> Result<(), InitError>;

    /// Number of lines the controller implements.
    fn line_count(&self) -> u16;

    /// Program priority and trigger type for `line`.
    fn set_priority_trigger(&mut self, line: LineId, priority: Priority, trigger: Trigger);

    /// Allow `line` to be delivered.
    fn enable_line(&mut self, line: LineId);

    /// Stop delivering `line`.
    fn disable_line(&mut self, line: LineId);

    /// Claim the highest-priority pending line, if any.
    fn acknowledge(&mut self) -> Option<LineId>;

    /// Signal completion of `line`.
    fn end_of_interrupt(&mut self, line: LineId);
}

/// One line-to-handler association.
#[derive(Copy, Clone)]
pub struct Binding<'a> {
    /// Bound line
    pub line: LineId,
    /// Handler (owns its context)
    pub handler: &'a dyn InterruptHandler,
    /// Programmed priority
    pub priority: Priority,
    /// Programmed trigger type
    pub trigger: Trigger,
    /// Delivery gate
    pub enabled: bool,
}

impl fmt::Debug for Binding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("line", &self.line)
            .field("handler", &"<dyn InterruptHandler>")
            .field("priority", &self.priority)
            .field("trigger", &self.trigger)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Interrupt controller with at most `N` bound lines.
///
/// Const-constructible, so it can live in a `static` and be handed to the
/// CPU as its IRQ [`Dispatch`] entry. Hardware is attached once with
/// [`attach`](Self::attach); until then it implements no lines.
pub struct InterruptController<'a, H: IrqHardware, const N: usize = 4> {
    hw: Mutex<RefCell<Option<H>>>,
    bindings: Mutex<RefCell<[Option<Binding<'a>>; N]>>,
    spurious: AtomicU32,
}

impl<H: IrqHardware, const N: usize> fmt::Debug for InterruptController<'_, H, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        critical_section::with(|cs| {
            let bindings = self.bindings.borrow_ref(cs);
            f.debug_struct("InterruptController")
                .field("initialized", &self.hw.borrow_ref(cs).is_some())
                .field("bindings", &Bound(&bindings[..]))
                .field("spurious", &self.spurious_count())
                .finish_non_exhaustive()
        })
    }
}

struct Bound<'t, 'a>(&'t [Option<Binding<'a>>]);

impl fmt::Debug for Bound<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().flatten()).finish()
    }
}

impl<'a, H: IrqHardware, const N: usize> InterruptController<'a, H, N> {
    /// Controller with no hardware attached and no bindings.
    pub const fn new() -> Self {
        Self {
            hw: Mutex::new(RefCell::new(None)),
            bindings: Mutex::new(RefCell::new([None; N])),
            spurious: AtomicU32::new(0),
        }
    }

    /// Take over the controller hardware and apply its base configuration.
    ///
    /// A controller is attached once; a second attach is refused and the
    /// first hardware kept.
    pub fn attach(&self, mut hw: H) -> Result<(), InitError> {
        if self.is_initialized() {
            return Err(InitError::ControllerInUse);
        }
        hw.initialize()?;
        log::debug!("interrupt controller up, {} lines", hw.line_count());

        critical_section::with(|cs| {
            let mut slot = self.hw.borrow_ref_mut(cs);
            if slot.is_some() {
                return Err(InitError::ControllerInUse);
            }
            *slot = Some(hw);
            Ok(())
        })
    }

    /// [`new`](Self::new) and [`attach`](Self::attach) in one go.
    pub fn initialize(hw: H) -> Result<Self, InitError> {
        let controller = Self::new();
        controller.attach(hw)?;
        Ok(controller)
    }

    /// Whether hardware is attached.
    pub fn is_initialized(&self) -> bool {
        critical_section::with(|cs| self.hw.borrow_ref(cs).is_some())
    }

    /// Bind `handler` to `line` with the given priority and trigger.
    ///
    /// The line starts disabled. Binding the same handler again is a no-op;
    /// a different handler is refused and the existing binding kept.
    pub fn connect(
        &self,
        line: LineId,
        handler: &'a dyn InterruptHandler,
        priority: Priority,
        trigger: Trigger,
    ) -> Result<(), BindError> {
        critical_section::with(|cs| {
            let mut hw = self.hw.borrow_ref_mut(cs);
            let hw = match hw.as_mut() {
                Some(hw) if line < hw.line_count() => hw,
                _ => return Err(BindError::InvalidLine { line }),
            };

            let mut bindings = self.bindings.borrow_ref_mut(cs);
            if let Some(existing) = bindings.iter().flatten().find(|b| b.line == line) {
                let same = core::ptr::addr_eq(
                    existing.handler as *const dyn InterruptHandler,
                    handler as *const dyn InterruptHandler,
                );
                return if same {
                    Ok(())
                } else {
                    Err(BindError::AlreadyBound { line })
                };
            }

            let slot = bindings
                .iter_mut()
                .find(|slot| slot.is_none())
                .ok_or(BindError::TableFull)?;
            *slot = Some(Binding {
                line,
                handler,
                priority,
                trigger,
                enabled: false,
            });

            hw.set_priority_trigger(line, priority, trigger);
            log::debug!("line {} bound (priority 0x{:02X}, {:?})", line, priority, trigger);
            Ok(())
        })
    }

    /// Start delivering `line`. The line must be bound.
    pub fn enable(&self, line: LineId) -> Result<(), ProtocolError> {
        self.set_enabled(line, true)
    }

    /// Stop delivering `line` without unbinding it.
    pub fn disable(&self, line: LineId) -> Result<(), ProtocolError> {
        self.set_enabled(line, false)
    }

    /// Remove the binding of `line`. Must follow [`disable`](Self::disable).
    pub fn disconnect(&self, line: LineId) -> Result<(), ProtocolError> {
        critical_section::with(|cs| {
            let mut bindings = self.bindings.borrow_ref_mut(cs);
            let slot = bindings
                .iter_mut()
                .find(|slot| slot.is_some_and(|b| b.line == line))
                .ok_or(ProtocolError::LineNotBound { line })?;

            if slot.is_some_and(|b| b.enabled) {
                return Err(ProtocolError::LineStillEnabled { line });
            }

            *slot = None;
            log::debug!("line {} disconnected", line);
            Ok(())
        })
    }

    /// Top-level interrupt routine: serve one pending line.
    ///
    /// Returns the line whose handler ran. A pending line without an enabled
    /// binding is acknowledged, counted as spurious and otherwise ignored.
    pub fn dispatch(&self) -> Option<LineId> {
        let (line, handler) = critical_section::with(|cs| {
            let line = self.hw.borrow_ref_mut(cs).as_mut()?.acknowledge()?;
            let handler = self
                .bindings
                .borrow_ref(cs)
                .iter()
                .flatten()
                .find(|b| b.line == line && b.enabled)
                .map(|b| b.handler);
            Some((line, handler))
        })?;

        let served = match handler {
            Some(handler) => {
                handler.on_interrupt(line);
                Some(line)
            }
            None => {
                self.spurious.fetch_add(1, Ordering::Relaxed);
                log::warn!("spurious interrupt on line {}", line);
                None
            }
        };

        critical_section::with(|cs| {
            if let Some(hw) = self.hw.borrow_ref_mut(cs).as_mut() {
                hw.end_of_interrupt(line);
            }
        });
        served
    }

    /// Whether `line` has a binding.
    pub fn is_connected(&self, line: LineId) -> bool {
        self.binding(line).is_some()
    }

    /// Whether `line` is bound and enabled.
    pub fn is_enabled(&self, line: LineId) -> bool {
        self.binding(line).is_some_and(|b| b.enabled)
    }

    /// Copy of the binding for `line`.
    pub fn binding(&self, line: LineId) -> Option<Binding<'a>> {
        critical_section::with(|cs| {
            self.bindings
                .borrow_ref(cs)
                .iter()
                .flatten()
                .find(|b| b.line == line)
                .copied()
        })
    }

    /// Interrupts that arrived with no enabled binding.
    pub fn spurious_count(&self) -> u32 {
        self.spurious.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, line: LineId, enabled: bool) -> Result<(), ProtocolError> {
        critical_section::with(|cs| {
            let mut bindings = self.bindings.borrow_ref_mut(cs);
            let binding = bindings
                .iter_mut()
                .flatten()
                .find(|b| b.line == line)
                .ok_or(ProtocolError::LineNotBound { line })?;

            binding.enabled = enabled;

            // A binding only exists once hardware is attached.
            if let Some(hw) = self.hw.borrow_ref_mut(cs).as_mut() {
                if enabled {
                    hw.enable_line(line);
                } else {
                    hw.disable_line(line);
                }
            }
            Ok(())
        })
    }
}

impl<H: IrqHardware, const N: usize> Default for InterruptController<'_, H, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: IrqHardware + Send, const N: usize> Dispatch for InterruptController<'_, H, N> {
    fn dispatch(&self) -> Option<LineId> {
        InterruptController::dispatch(self)
    }
}
