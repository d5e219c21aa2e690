//! ARMv7-M / ARMv6-M.
//!
//! Masks through PRIMASK and reads the active vector from the low bits of
//! the Interrupt Control and State Register.

use super::CpuOps;

/// SCB Interrupt Control and State Register.
const ICSR: *const u32 = 0xE000_ED04 as *const u32;

/// VECTACTIVE field. ARMv6-M implements only the low six bits, the rest read
/// as zero.
const VECTACTIVE_MASK: u32 = 0x1FF;

pub struct CortexMCpu;

impl CortexMCpu {
    #[inline]
    fn primask() -> u32 {
        let primask: u32;
        unsafe {
            core::arch::asm!("mrs {}, PRIMASK", out(reg) primask, options(nomem, nostack, preserves_flags));
        }
        primask
    }
}

impl CpuOps for CortexMCpu {
    #[inline]
    fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let was_masked = Self::primask() & 1 != 0;
        unsafe {
            core::arch::asm!("cpsid i", options(nostack, preserves_flags));
        }

        let result = f();

        if !was_masked {
            unsafe {
                core::arch::asm!("cpsie i", options(nostack, preserves_flags));
            }
        }
        result
    }

    #[inline]
    fn active_interrupt() -> u32 {
        // SAFETY: ICSR is always mapped on M-profile cores and reads have no
        // side effects.
        unsafe { core::ptr::read_volatile(ICSR) & VECTACTIVE_MASK }
    }
}
