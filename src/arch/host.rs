//! Hosted targets.
//!
//! There is no interrupt mask in user space, so masked sections are
//! serialized through one global spin lock. With `std` the lock is reentrant
//! per thread, matching how a real mask nests.

use super::CpuOps;

static MASK: spin::Mutex<()> = spin::Mutex::new(());

pub struct HostCpu;

#[cfg(feature = "std")]
mod depth {
    use core::cell::Cell;

    std::thread_local! {
        static DEPTH: Cell<usize> = const { Cell::new(0) };
    }

    pub fn get() -> usize {
        DEPTH.with(Cell::get)
    }

    /// Marks the current thread as holding the mask until dropped.
    pub struct Held;

    impl Held {
        pub fn enter() -> Self {
            DEPTH.with(|d| d.set(d.get() + 1));
            Held
        }
    }

    impl Drop for Held {
        fn drop(&mut self) {
            DEPTH.with(|d| d.set(d.get() - 1));
        }
    }
}

impl CpuOps for HostCpu {
    #[cfg(feature = "std")]
    fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if depth::get() > 0 {
            return f();
        }
        let _guard = MASK.lock();
        let _held = depth::Held::enter();
        f()
    }

    #[cfg(not(feature = "std"))]
    fn without_interrupts<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = MASK.lock();
        f()
    }
}
