//! The view of the host kernel the tracer consumes.
//!
//! The tracer never walks kernel data structures itself. Everything it needs
//! beyond what the lifecycle hooks pass in comes through [`Kernel`].

use crate::arch::{Cpu, CpuOps};
use crate::timestamp::cycle_counter;

/// Compress a kernel object address into a wire id.
///
/// Addresses below `base` or not aligned to `1 << shift` produce meaningless
/// ids; the configuration has to match the kernel's memory layout.
#[inline]
pub const fn object_id(addr: usize, base: usize, shift: u32) -> u32 {
    (addr.wrapping_sub(base) >> shift) as u32
}

/// Kernel object classes that produce trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Thread,
    Semaphore,
    Mutex,
    Event,
    MailBox,
    MessageQueue,
    Timer,
    /// Memory pools, devices and anything else the tracer ignores.
    Other,
}

/// A kernel object as seen by the object hooks.
#[derive(Debug, Clone, Copy)]
pub struct KernelObject<'a> {
    pub addr: usize,
    pub class: ObjectClass,
    pub name: &'a str,
    /// Current flag set, meaningful for [`ObjectClass::Event`] only.
    pub event_set: u32,
}

impl<'a> KernelObject<'a> {
    pub const fn new(addr: usize, class: ObjectClass, name: &'a str) -> Self {
        Self {
            addr,
            class,
            name,
            event_set: 0,
        }
    }

    pub const fn event(addr: usize, name: &'a str, set: u32) -> Self {
        Self {
            addr,
            class: ObjectClass::Event,
            name,
            event_set: set,
        }
    }
}

/// What the tracer reports about a thread.
#[derive(Debug, Clone, Copy)]
pub struct ThreadInfo<'a> {
    pub addr: usize,
    pub name: &'a str,
    pub priority: u32,
    pub stack_addr: usize,
    pub stack_size: u32,
}

/// Kernel services the tracer calls back into.
///
/// Implementations must be callable from interrupt context: no blocking, no
/// allocation.
pub trait Kernel {
    /// Free-running timestamp, low 32 bits.
    fn timestamp(&self) -> u32 {
        cycle_counter()
    }

    /// Number of the interrupt currently being serviced.
    fn active_interrupt(&self) -> u32 {
        Cpu::active_interrupt()
    }

    /// Interrupt nesting depth, already decremented when the leave hook runs.
    fn interrupt_nest(&self) -> u32;

    /// Address of the running thread.
    fn current_thread(&self) -> usize;

    /// Address of the idle thread.
    fn idle_thread(&self) -> usize;

    /// Milliseconds since boot.
    fn system_time_ms(&self) -> u64;

    /// Visit every live thread, idle included.
    fn for_each_thread(&self, f: &mut dyn FnMut(&ThreadInfo<'_>));
}
