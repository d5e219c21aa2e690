//! Default timestamp source.
//!
//! The stream only carries 32-bit deltas, so the low word of a free-running
//! counter is all the tracer needs. Wraparound is harmless: deltas are
//! computed modulo 2^32.
//!
//! - x86-64: RDTSC
//! - ARM64: CNTVCT_EL0
//! - Cortex-M: DWT cycle counter (must be enabled by the board)
//! - hosted: nanoseconds since first use

/// Read the low 32 bits of the CPU's cycle counter.
#[inline(always)]
pub fn cycle_counter() -> u32 {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    {
        let low: u32;
        unsafe {
            core::arch::asm!(
                "rdtsc",
                out("eax") low,
                out("edx") _,
                options(nostack, nomem, preserves_flags)
            );
        }
        low
    }

    #[cfg(all(target_arch = "aarch64", target_os = "none"))]
    {
        let val: u64;
        unsafe {
            core::arch::asm!("mrs {}, cntvct_el0", out(reg) val, options(nomem, nostack));
        }
        val as u32
    }

    #[cfg(all(target_arch = "arm", target_os = "none"))]
    {
        const DWT_CYCCNT: *const u32 = 0xE000_1004 as *const u32;
        unsafe { core::ptr::read_volatile(DWT_CYCCNT) }
    }

    #[cfg(not(all(
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "arm"),
        target_os = "none"
    )))]
    {
        host::now()
    }
}

#[cfg(not(all(
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "arm"),
    target_os = "none"
)))]
mod host {
    #[cfg(feature = "std")]
    pub fn now() -> u32 {
        use std::time::Instant;

        static EPOCH: spin::Once<Instant> = spin::Once::new();
        EPOCH.call_once(Instant::now).elapsed().as_nanos() as u32
    }

    /// Without a clock, a strictly increasing count still orders events.
    #[cfg(not(feature = "std"))]
    pub fn now() -> u32 {
        use core::sync::atomic::{AtomicU32, Ordering};

        static TICKS: AtomicU32 = AtomicU32::new(0);
        TICKS.fetch_add(1, Ordering::Relaxed)
    }
}
