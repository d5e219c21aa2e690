//! Drain task.
//!
//! A low-priority task empties the trace buffer by calling the notify hook
//! while more than [`TraceConfig::drain_threshold`] bytes are pending. Once
//! the fill drops below that it parks on a [`DrainSignal`]. Producers unpark
//! it when their admission pushes the fill past the watermark, and
//! [`Tracer::stop`] unparks it so it can observe the state change.
//!
//! The task lives as long as the tracer unless [`Tracer::shutdown_drain`] is
//! called.
//!
//! [`TraceConfig::drain_threshold`]: crate::TraceConfig::drain_threshold

use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::{Cpu, CpuOps};
use crate::buffer::RingBuffer;
use crate::kernel::Kernel;
use crate::status::TraceState;
use crate::tracer::{NotifyHook, Tracer};

/// Park/unpark primitive for the drain task.
///
/// `notify` may run before the matching `wait`; the wake-up must not be lost.
pub trait DrainSignal {
    /// Block until notified, consuming the notification.
    fn wait(&self);

    /// Wake the waiter, or let its next `wait` return immediately.
    fn notify(&self);
}

/// Busy-waiting signal for targets without a scheduler to block on.
#[derive(Default)]
pub struct SpinSignal {
    pending: AtomicBool,
}

impl SpinSignal {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }
}

impl DrainSignal for SpinSignal {
    fn wait(&self) {
        while !self.pending.swap(false, Ordering::AcqRel) {
            core::hint::spin_loop();
        }
    }

    fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }
}

#[cfg(feature = "std")]
pub use self::condvar::CondvarSignal;

#[cfg(feature = "std")]
mod condvar {
    use super::DrainSignal;
    use std::sync::{Condvar, Mutex, PoisonError};

    /// Blocking signal backed by a condition variable.
    #[derive(Default)]
    pub struct CondvarSignal {
        pending: Mutex<bool>,
        cond: Condvar,
    }

    impl CondvarSignal {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DrainSignal for CondvarSignal {
        fn wait(&self) {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            while !*pending {
                pending = self
                    .cond
                    .wait(pending)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            *pending = false;
        }

        fn notify(&self) {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            *pending = true;
            self.cond.notify_one();
        }
    }
}

/// Signal used by [`Tracer::new`].
#[cfg(feature = "std")]
pub type DefaultSignal = CondvarSignal;

#[cfg(not(feature = "std"))]
pub type DefaultSignal = SpinSignal;

/// Read side of the trace buffer, handed to the notify hook.
pub struct Pending<'a> {
    ring: &'a RingBuffer,
}

impl<'a> Pending<'a> {
    pub(crate) fn new(ring: &'a RingBuffer) -> Self {
        Self { ring }
    }

    /// Move up to `out.len()` buffered bytes into `out`.
    #[inline]
    pub fn get(&self, out: &mut [u8]) -> usize {
        self.ring.get(out)
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.ring.used()
    }
}

/// The installed notify hook.
///
/// `generation` changes on every install or clear, so a hook replaced while
/// the drain task was running it is not put back afterwards.
pub(crate) struct HookSlot {
    hook: Option<NotifyHook>,
    generation: u32,
}

impl HookSlot {
    pub(crate) const fn new() -> Self {
        Self {
            hook: None,
            generation: 0,
        }
    }

    pub(crate) fn replace(&mut self, hook: Option<NotifyHook>) {
        self.hook = hook;
        self.generation = self.generation.wrapping_add(1);
    }
}

impl<K: Kernel, S: DrainSignal> Tracer<K, S> {
    /// Body of the drain task. Returns only after
    /// [`Tracer::shutdown_drain`].
    pub fn run_drain(&self) {
        log::debug!("rti: drain task running");
        while !self.drain_should_stop.load(Ordering::Acquire) {
            let can_progress = self.drain_pending();
            if !self.park(can_progress) {
                continue;
            }
            // A stop request that raced with parking already notified; wait
            // returns at once and the loop condition sees it.
            self.signal.wait();
        }
        self.drain_parked.store(false, Ordering::Release);
        log::debug!("rti: drain task exiting");
    }

    /// Mark the drain task parked, unless `can_progress` and a producer
    /// pushed the fill back past the wake level after the last pass. Returns
    /// whether the task parked.
    ///
    /// Producers decide on a wake-up under the same mask, so an admission
    /// either sees the parked flag or is seen here.
    fn park(&self, can_progress: bool) -> bool {
        let limit = self.config.watermark().max(self.config.drain_threshold);
        Cpu::without_interrupts(|| {
            if can_progress && self.ring.used() > limit {
                return false;
            }
            self.drain_parked.store(true, Ordering::Release);
            true
        })
    }

    /// Whether the drain task is waiting for a wake-up.
    pub fn is_drain_parked(&self) -> bool {
        self.drain_parked.load(Ordering::Acquire)
    }

    /// Ask the drain task to exit and wake it.
    pub fn shutdown_drain(&self) {
        self.drain_should_stop.store(true, Ordering::Release);
        self.drain_parked.store(false, Ordering::Release);
        self.signal.notify();
    }

    /// Call the notify hook until the backlog is at or below the drain
    /// threshold. Draining continues in overflow; that is how the overflow
    /// record gets room.
    ///
    /// Returns false when another pass right away would be pointless:
    /// recording is off, no hook is installed or the hook stopped moving
    /// bytes.
    fn drain_pending(&self) -> bool {
        let (mut hook, generation) = {
            let mut slot = self.notify.lock();
            (slot.hook.take(), slot.generation)
        };

        let Some(notify) = hook.as_mut() else {
            let pending = self.ring.used();
            if self.state() != TraceState::Disabled && pending > self.config.drain_threshold {
                log::warn!("rti: {} bytes pending but no notify hook installed", pending);
            }
            return false;
        };

        let mut progressed = true;
        while self.state() != TraceState::Disabled
            && self.ring.used() > self.config.drain_threshold
        {
            let before = self.ring.used();
            notify(&Pending::new(&self.ring));
            if self.ring.used() >= before {
                progressed = false;
                break;
            }
        }

        let mut slot = self.notify.lock();
        if slot.generation == generation {
            slot.hook = hook;
        }
        progressed && self.state() != TraceState::Disabled
    }
}

/// Run the drain task on a dedicated thread.
#[cfg(feature = "std")]
pub fn spawn_drain<K, S>(
    tracer: alloc::sync::Arc<Tracer<K, S>>,
) -> Result<std::thread::JoinHandle<()>, crate::TraceError>
where
    K: Kernel + Send + Sync + 'static,
    S: DrainSignal + Send + Sync + 'static,
{
    std::thread::Builder::new()
        .name("rti".into())
        .spawn(move || tracer.run_drain())
        .map_err(|err| {
            log::warn!("rti: failed to spawn drain thread: {}", err);
            crate::TraceError::DrainSpawn
        })
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::config::TraceConfig;
    use crate::kernel::ThreadInfo;
    use std::sync::Arc;
    use std::time::Duration;

    struct IdleKernel;

    impl Kernel for IdleKernel {
        fn interrupt_nest(&self) -> u32 {
            0
        }
        fn current_thread(&self) -> usize {
            0
        }
        fn idle_thread(&self) -> usize {
            0
        }
        fn system_time_ms(&self) -> u64 {
            0
        }
        fn for_each_thread(&self, _f: &mut dyn FnMut(&ThreadInfo<'_>)) {}
    }

    fn tracer() -> Tracer<IdleKernel, SpinSignal> {
        let config = TraceConfig::new()
            .with_buffer_size(64)
            .with_drain_threshold(32);
        Tracer::with_signal(IdleKernel, config, SpinSignal::new()).unwrap()
    }

    #[test]
    fn test_notify_before_wait_is_not_lost() {
        let signal = CondvarSignal::new();
        signal.notify();
        signal.wait();

        let spin = SpinSignal::new();
        spin.notify();
        spin.wait();
    }

    #[test]
    fn test_condvar_wakes_waiter() {
        let signal = Arc::new(CondvarSignal::new());
        let waiter = {
            let signal = signal.clone();
            std::thread::spawn(move || signal.wait())
        };
        std::thread::sleep(Duration::from_millis(10));
        signal.notify();
        waiter.join().unwrap();
    }

    #[test]
    fn test_pending_reads_ring() {
        let ring = RingBuffer::with_capacity(16).unwrap();
        ring.put(&[1, 2, 3]);
        let pending = Pending::new(&ring);
        assert_eq!(pending.used(), 3);
        let mut out = [0u8; 8];
        assert_eq!(pending.get(&mut out), 3);
        assert_eq!(pending.used(), 0);
    }

    // =========================================================================
    // Parking
    // =========================================================================

    #[test]
    fn test_park_rechecks_fill() {
        let tracer = tracer();
        // A producer crossed the wake level after the last drain pass.
        tracer.ring.put(&[0; 40]);
        assert!(!tracer.park(true));
        assert!(!tracer.is_drain_parked());

        // Nothing more can be drained, so the task parks regardless.
        assert!(tracer.park(false));
        assert!(tracer.is_drain_parked());
    }

    #[test]
    fn test_park_below_wake_level() {
        let tracer = tracer();
        tracer.ring.put(&[0; 20]);
        assert!(tracer.park(true));
        assert!(tracer.is_drain_parked());
    }

    #[test]
    fn test_drain_pending_without_hook_cannot_progress() {
        let tracer = tracer();
        tracer.ring.put(&[0; 40]);
        assert!(!tracer.drain_pending());
    }
}
