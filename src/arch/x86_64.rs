//! x86_64 bare metal.

use super::CpuOps;

pub struct X86Cpu;

impl CpuOps for X86Cpu {
    #[inline]
    fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        ::x86_64::instructions::interrupts::without_interrupts(f)
    }
}
