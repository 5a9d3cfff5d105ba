//! Software model of the board: an AXI timer and a GIC-style controller.
//!
//! The models are plain `no_std` state behind critical sections, so they
//! work both single-threaded (tests firing "interrupts" from an idle hook)
//! and with a separate hardware thread on a host. `&SimTimer` is the
//! timer's register window and `&SimIntc` its controller hardware.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;

use crate::bringup::Platform;
use crate::error::InitError;
use crate::io::RegisterIo;
use crate::irq::{
    Dispatch, ExceptionCpu, InterruptController, IrqHardware, LineId, Priority, Trigger,
};
use crate::timer::regs::{self, COUNTERS_PER_DEVICE, TCR, TCSR, TLR, tcsr};

/// Pending interrupts the controller model can queue.
pub const PENDING_DEPTH: usize = 16;

/// Line-configuration records kept by the controller model.
pub const MAX_CONFIGURED: usize = 8;

/// Interrupt controller driving a [`SimIntc`].
pub type SimController<'a, 'b, const N: usize = 4> = InterruptController<'a, &'b SimIntc, N>;

// ============================================================================
// Timer
// ============================================================================

#[derive(Debug, Default, Copy, Clone)]
struct CounterModel {
    starts: u32,
    stops: u32,
}

#[derive(Debug)]
struct TimerModel {
    regs: [u32; 8],
    counters: [CounterModel; COUNTERS_PER_DEVICE as usize],
    stuck_load_bits: u32,
}

/// AXI timer register model with two counters.
///
/// Writes honor `LOAD`, `TINT` write-one-to-clear, and count `ENT`
/// transitions as starts and stops. Time does not pass on its own:
/// [`expire`](Self::expire) advances a counter to its next expiry.
pub struct SimTimer {
    model: Mutex<RefCell<TimerModel>>,
}

impl fmt::Debug for SimTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        critical_section::with(|cs| {
            f.debug_struct("SimTimer")
                .field("model", &*self.model.borrow_ref(cs))
                .finish()
        })
    }
}

impl SimTimer {
    /// Timer with every register cleared.
    pub const fn new() -> Self {
        Self {
            model: Mutex::new(RefCell::new(TimerModel {
                regs: [0; 8],
                counters: [CounterModel { starts: 0, stops: 0 }; COUNTERS_PER_DEVICE as usize],
                stuck_load_bits: 0,
            })),
        }
    }

    /// Fault injection: `mask` bits of the load register read back as zero.
    pub fn with_stuck_load_bits(self, mask: u32) -> Self {
        critical_section::with(|cs| self.model.borrow_ref_mut(cs).stuck_load_bits = mask);
        self
    }

    /// Let `counter` reach its terminal count.
    ///
    /// A disabled counter does nothing. An enabled one sets its interrupt
    /// flag and then reloads (auto reload) or stops. Returns whether the
    /// counter requests an interrupt (flag set and interrupts enabled).
    pub fn expire(&self, counter: u8) -> bool {
        critical_section::with(|cs| {
            let mut model = self.model.borrow_ref_mut(cs);
            let base = Self::index(counter, TCSR);
            let control = model.regs[base];
            if control & tcsr::ENT == 0 {
                return false;
            }

            model.regs[base] |= tcsr::TINT;
            if control & tcsr::ARHT != 0 {
                model.regs[Self::index(counter, TCR)] = model.regs[Self::index(counter, TLR)];
            } else {
                model.regs[base] &= !tcsr::ENT;
            }
            control & tcsr::ENIT != 0
        })
    }

    /// Set the interrupt flag of `counter` regardless of its state.
    pub fn force_expiry(&self, counter: u8) {
        critical_section::with(|cs| {
            self.model.borrow_ref_mut(cs).regs[Self::index(counter, TCSR)] |= tcsr::TINT;
        });
    }

    /// Raw register value, as seen through the bus.
    pub fn register(&self, counter: u8, reg: usize) -> u32 {
        (&self).read(regs::offset(counter, reg))
    }

    /// Whether `counter` is enabled.
    pub fn is_running(&self, counter: u8) -> bool {
        self.register(counter, TCSR) & tcsr::ENT != 0
    }

    /// Times `counter` went from disabled to enabled.
    pub fn starts(&self, counter: u8) -> u32 {
        critical_section::with(|cs| self.model.borrow_ref(cs).counters[counter as usize].starts)
    }

    /// Times `counter` went from enabled to disabled.
    pub fn stops(&self, counter: u8) -> u32 {
        critical_section::with(|cs| self.model.borrow_ref(cs).counters[counter as usize].stops)
    }

    fn index(counter: u8, reg: usize) -> usize {
        regs::offset(counter, reg) / 4
    }
}

impl Default for SimTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterIo for &SimTimer {
    fn read(&self, offset: usize) -> u32 {
        critical_section::with(|cs| {
            let model = self.model.borrow_ref(cs);
            let value = model.regs[offset / 4];
            if offset % regs::COUNTER_STRIDE == TLR {
                value & !model.stuck_load_bits
            } else {
                value
            }
        })
    }

    fn write(&mut self, offset: usize, value: u32) {
        critical_section::with(|cs| {
            let mut model = self.model.borrow_ref_mut(cs);
            let index = offset / 4;
            if offset % regs::COUNTER_STRIDE != TCSR {
                model.regs[index] = value;
                return;
            }

            let old = model.regs[index];
            let flag = old & tcsr::TINT & !value;
            model.regs[index] = (value & !tcsr::TINT) | flag;

            if value & tcsr::LOAD != 0 {
                let load = model.regs[index + 1] & !model.stuck_load_bits;
                model.regs[index + 2] = load;
            }

            let counter = &mut model.counters[offset / regs::COUNTER_STRIDE];
            match (old & tcsr::ENT != 0, value & tcsr::ENT != 0) {
                (false, true) => counter.starts += 1,
                (true, false) => counter.stops += 1,
                _ => {}
            }
        })
    }
}

// ============================================================================
// Interrupt controller
// ============================================================================

#[derive(Debug)]
struct IntcModel {
    line_count: u16,
    reject: bool,
    initialized: bool,
    enabled: [u32; 8],
    pending: heapless::Deque<LineId, PENDING_DEPTH>,
    configured: heapless::Vec<(LineId, Priority, Trigger), MAX_CONFIGURED>,
    disables: u32,
    eois: u32,
}

/// GIC-style controller model.
///
/// Tracks enabled lines, a pending queue in arrival order, and counts
/// line disables and end-of-interrupt signals.
pub struct SimIntc {
    model: Mutex<RefCell<IntcModel>>,
}

impl fmt::Debug for SimIntc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        critical_section::with(|cs| {
            f.debug_struct("SimIntc")
                .field("model", &*self.model.borrow_ref(cs))
                .finish()
        })
    }
}

impl SimIntc {
    /// Controller implementing `line_count` lines (at most 256).
    pub const fn new(line_count: u16) -> Self {
        Self {
            model: Mutex::new(RefCell::new(IntcModel {
                line_count,
                reject: false,
                initialized: false,
                enabled: [0; 8],
                pending: heapless::Deque::new(),
                configured: heapless::Vec::new(),
                disables: 0,
                eois: 0,
            })),
        }
    }

    /// Fault injection: refuse initialization.
    pub fn rejecting(self) -> Self {
        critical_section::with(|cs| self.model.borrow_ref_mut(cs).reject = true);
        self
    }

    /// Signal `line`. Queued only if the line is enabled.
    pub fn raise(&self, line: LineId) -> bool {
        critical_section::with(|cs| {
            let mut model = self.model.borrow_ref_mut(cs);
            if !model.is_enabled(line) {
                return false;
            }
            model.pending.push_back(line).is_ok()
        })
    }

    /// Queue `line` even if it is not enabled.
    pub fn raise_forced(&self, line: LineId) -> bool {
        critical_section::with(|cs| self.model.borrow_ref_mut(cs).pending.push_back(line).is_ok())
    }

    /// Whether `line` is enabled.
    pub fn is_enabled(&self, line: LineId) -> bool {
        critical_section::with(|cs| self.model.borrow_ref(cs).is_enabled(line))
    }

    /// Number of queued interrupts.
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.model.borrow_ref(cs).pending.len())
    }

    /// Priority and trigger last programmed for `line`.
    pub fn line_config(&self, line: LineId) -> Option<(Priority, Trigger)> {
        critical_section::with(|cs| {
            self.model
                .borrow_ref(cs)
                .configured
                .iter()
                .rev()
                .find(|(l, _, _)| *l == line)
                .map(|&(_, priority, trigger)| (priority, trigger))
        })
    }

    /// Line disables so far.
    pub fn disables(&self) -> u32 {
        critical_section::with(|cs| self.model.borrow_ref(cs).disables)
    }

    /// End-of-interrupt signals so far.
    pub fn eois(&self) -> u32 {
        critical_section::with(|cs| self.model.borrow_ref(cs).eois)
    }

    /// Whether the controller has been initialized.
    pub fn is_initialized(&self) -> bool {
        critical_section::with(|cs| self.model.borrow_ref(cs).initialized)
    }
}

impl IntcModel {
    fn is_enabled(&self, line: LineId) -> bool {
        let line = usize::from(line);
        line < 256 && self.enabled[line / 32] & (1 << (line % 32)) != 0
    }

    fn set_enabled(&mut self, line: LineId, on: bool) {
        let line = usize::from(line);
        if line >= 256 {
            return;
        }
        let mask = 1 << (line % 32);
        if on {
            self.enabled[line / 32] |= mask;
        } else {
            self.enabled[line / 32] &= !mask;
        }
    }
}

impl IrqHardware for &SimIntc {
    fn initialize(&mut self) -> Result<(), InitError> {
        critical_section::with(|cs| {
            let mut model = self.model.borrow_ref_mut(cs);
            if model.reject {
                return Err(InitError::ControllerRejected);
            }
            model.initialized = true;
            Ok(())
        })
    }

    fn line_count(&self) -> u16 {
        critical_section::with(|cs| self.model.borrow_ref(cs).line_count)
    }

    fn set_priority_trigger(&mut self, line: LineId, priority: Priority, trigger: Trigger) {
        critical_section::with(|cs| {
            let mut model = self.model.borrow_ref_mut(cs);
            if model.configured.push((line, priority, trigger)).is_err() {
                log::warn!("sim intc: configuration log full");
            }
        })
    }

    fn enable_line(&mut self, line: LineId) {
        critical_section::with(|cs| self.model.borrow_ref_mut(cs).set_enabled(line, true))
    }

    fn disable_line(&mut self, line: LineId) {
        critical_section::with(|cs| {
            let mut model = self.model.borrow_ref_mut(cs);
            model.set_enabled(line, false);
            model.disables += 1;
        })
    }

    fn acknowledge(&mut self) -> Option<LineId> {
        critical_section::with(|cs| self.model.borrow_ref_mut(cs).pending.pop_front())
    }

    fn end_of_interrupt(&mut self, _line: LineId) {
        critical_section::with(|cs| self.model.borrow_ref_mut(cs).eois += 1)
    }
}

// ============================================================================
// Board
// ============================================================================

/// Timer and controller wired together.
#[derive(Debug)]
pub struct SimBoard {
    /// Timer device model
    pub timer: SimTimer,
    /// Interrupt controller model
    pub intc: SimIntc,
}

impl SimBoard {
    /// Board with a fresh timer and a controller implementing `line_count` lines.
    pub const fn new(line_count: u16) -> Self {
        Self {
            timer: SimTimer::new(),
            intc: SimIntc::new(line_count),
        }
    }

    /// One timer period: expire `counter` and, if it requests an
    /// interrupt, raise `line`. Returns whether an interrupt was queued.
    pub fn pulse(&self, counter: u8, line: LineId) -> bool {
        self.timer.expire(counter) && self.intc.raise(line)
    }

    /// Expiry the timer did not ask for: set the flag and queue `line`
    /// even if it is disabled.
    pub fn force_pulse(&self, counter: u8, line: LineId) -> bool {
        self.timer.force_expiry(counter);
        self.intc.raise_forced(line)
    }

    /// Platform view with the timer at `timer_device` and the controller at
    /// `intc_device`.
    pub fn platform(&self, timer_device: u16, intc_device: u16) -> SimPlatform<'_> {
        SimPlatform {
            board: self,
            timer_device,
            intc_device,
            dispatcher: None,
            dispatchers: 0,
            exceptions_enabled: false,
        }
    }
}

/// [`Platform`] over a [`SimBoard`], including the CPU's IRQ vector.
///
/// Pending interrupts reach a handler only through the registered
/// dispatcher and only after exceptions are enabled. Before that they stay
/// pending in the controller model, as on hardware with IRQs masked.
pub struct SimPlatform<'b> {
    board: &'b SimBoard,
    timer_device: u16,
    intc_device: u16,
    dispatcher: Option<&'b dyn Dispatch>,
    dispatchers: u32,
    exceptions_enabled: bool,
}

impl fmt::Debug for SimPlatform<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimPlatform")
            .field("timer_device", &self.timer_device)
            .field("intc_device", &self.intc_device)
            .field("dispatchers", &self.dispatchers)
            .field("exceptions_enabled", &self.exceptions_enabled)
            .finish_non_exhaustive()
    }
}

impl SimPlatform<'_> {
    /// Dispatcher registrations seen.
    pub fn dispatchers(&self) -> u32 {
        self.dispatchers
    }

    /// Whether exception delivery was enabled.
    pub fn exceptions_enabled(&self) -> bool {
        self.exceptions_enabled
    }

    /// Take the IRQ exception for everything pending.
    ///
    /// Returns the number of handler invocations; zero while exceptions
    /// are masked or no dispatcher is registered.
    pub fn deliver(&self) -> u32 {
        let dispatcher = match self.dispatcher {
            Some(dispatcher) if self.exceptions_enabled => dispatcher,
            _ => return 0,
        };

        let mut served = 0;
        for _ in 0..self.board.intc.pending() {
            if dispatcher.dispatch().is_some() {
                served += 1;
            }
        }
        served
    }

    /// One timer period on the board, then [`deliver`](Self::deliver).
    pub fn tick(&self, counter: u8, line: LineId) -> u32 {
        self.board.pulse(counter, line);
        self.deliver()
    }
}

impl<'b> ExceptionCpu<'b> for SimPlatform<'b> {
    fn register_dispatcher(&mut self, dispatcher: &'b dyn Dispatch) {
        log::debug!("sim cpu: irq dispatcher registered");
        self.dispatcher = Some(dispatcher);
        self.dispatchers += 1;
    }

    fn enable_exceptions(&mut self) {
        self.exceptions_enabled = true;
    }
}

impl<'b> Platform<'b> for SimPlatform<'b> {
    type TimerRegs = &'b SimTimer;
    type Irq = &'b SimIntc;

    fn timer_registers(&mut self, device_id: u16) -> Option<&'b SimTimer> {
        let board = self.board;
        (device_id == self.timer_device).then_some(&board.timer)
    }

    fn interrupt_controller(&mut self, device_id: u16) -> Option<&'b SimIntc> {
        let board = self.board;
        (device_id == self.intc_device).then_some(&board.intc)
    }
}
