//! Interrupt masking per target.
//!
//! Every write into the trace buffer happens inside
//! [`CpuOps::without_interrupts`]. On bare-metal targets that is the cheapest
//! local-IRQ mask the core offers; on hosted targets it is emulated with a
//! global lock.

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod x86_64;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub mod aarch64;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m;

pub mod host;

/// CPU operations the tracer needs.
pub trait CpuOps {
    /// Run `f` with local interrupts masked, restoring the previous mask
    /// state afterwards.
    fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R;

    /// Number of the interrupt currently being serviced.
    ///
    /// Cores without a readable active-vector register return 0; their
    /// handlers report the number through
    /// [`crate::TraceHooks::on_interrupt_enter_irq`] instead.
    #[inline]
    fn active_interrupt() -> u32 {
        0
    }
}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use self::x86_64::X86Cpu as Cpu;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use self::aarch64::Aarch64Cpu as Cpu;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use self::cortex_m::CortexMCpu as Cpu;

#[cfg(not(all(
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "arm"),
    target_os = "none"
)))]
pub use self::host::HostCpu as Cpu;
