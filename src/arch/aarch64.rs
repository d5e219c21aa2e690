//! AArch64 bare metal.
//!
//! Masks IRQs through the DAIF I bit. GIC-based systems do not expose the
//! active interrupt number in a system register the tracer can read, so
//! handlers pass it explicitly.

use super::CpuOps;

pub struct Aarch64Cpu;

impl CpuOps for Aarch64Cpu {
    #[inline]
    fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let daif: u64;
        unsafe {
            core::arch::asm!("mrs {}, daif", out(reg) daif, options(nomem, nostack));
            core::arch::asm!("msr daifset, #2", options(nostack));
        }

        let result = f();

        unsafe {
            core::arch::asm!("msr daif, {}", in(reg) daif, options(nostack));
        }
        result
    }
}
