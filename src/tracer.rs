//! Trace state machine and packet transport.
//!
//! One [`Tracer`] owns the ring buffer, the global recording state and the
//! per-category disable counters. Producers (the hooks in
//! [`crate::hooks`]) build a [`Packet`] on their own stack and hand it to
//! [`Tracer::send`], which timestamps and admits it inside a single
//! interrupt-masked section.
//!
//! # State machine
//!
//! ```text
//!             start()                 put refused
//! Disabled ------------> Enabled ------------------> Overflow
//!    ^                     |  ^                         |
//!    |       stop()        |  |  overflow record put    |
//!    +---------------------+  +-------------------------+
//! ```
//!
//! While in `Overflow` every send first retries the overflow record. Only
//! once that record is in the buffer do regular packets flow again, so the
//! viewer always learns how many packets were dropped before it sees the
//! next one.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::arch::{Cpu, CpuOps};
use crate::buffer::RingBuffer;
use crate::config::TraceConfig;
use crate::drain::{DefaultSignal, DrainSignal, HookSlot, Pending};
use crate::error::TraceError;
use crate::kernel::{object_id, Kernel, ThreadInfo};
use crate::packet::{EventId, Packet};
use crate::status::{TraceMask, TraceState, TraceStatus, CATEGORY_COUNT};

/// Callback the drain task invokes while data is pending.
///
/// The hook pulls bytes through [`Pending::get`] and writes them to the
/// physical transport.
pub type NotifyHook = Box<dyn FnMut(&Pending<'_>) + Send>;

/// Ten zero bytes the viewer uses to find the start of the stream.
const SYNC_PREAMBLE: [u8; 10] = [0; 10];

/// What a masked send did, for logging once interrupts are back on.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Transition {
    None,
    EnteredOverflow,
    Recovered { lost: u32 },
}

/// The event tracer.
pub struct Tracer<K, S = DefaultSignal> {
    pub(crate) kernel: K,
    pub(crate) config: TraceConfig,
    pub(crate) ring: RingBuffer,

    state: AtomicU8,
    last_timestamp: AtomicU32,
    lost_packets: AtomicU32,
    nest: [AtomicU8; CATEGORY_COUNT],

    /// Set by the drain task right before it waits on `signal`.
    pub(crate) drain_parked: AtomicBool,
    pub(crate) drain_should_stop: AtomicBool,
    pub(crate) signal: S,
    pub(crate) notify: spin::Mutex<HookSlot>,
}

impl<K: Kernel> Tracer<K> {
    /// Allocate the trace buffer. Recording stays off until
    /// [`Tracer::start`].
    pub fn new(kernel: K, config: TraceConfig) -> Result<Self, TraceError> {
        Self::with_signal(kernel, config, DefaultSignal::default())
    }
}

impl<K: Kernel, S: DrainSignal> Tracer<K, S> {
    /// Like [`Tracer::new`], with a custom drain wake-up primitive.
    pub fn with_signal(kernel: K, config: TraceConfig, signal: S) -> Result<Self, TraceError> {
        let ring = RingBuffer::with_capacity(config.buffer_size)?;

        if config.sys_freq == 0 || config.cpu_freq == 0 {
            log::warn!("rti: clock frequency not configured, viewer timing will be wrong");
        }
        log::info!(
            "rti: initialized ({} byte buffer, drain above {} bytes, wake above {} bytes)",
            config.buffer_size,
            config.drain_threshold,
            config.watermark()
        );

        Ok(Self {
            kernel,
            config,
            ring,
            state: AtomicU8::new(TraceState::Disabled as u8),
            last_timestamp: AtomicU32::new(0),
            lost_packets: AtomicU32::new(0),
            nest: core::array::from_fn(|_| AtomicU8::new(0)),
            drain_parked: AtomicBool::new(false),
            drain_should_stop: AtomicBool::new(false),
            signal,
            notify: spin::Mutex::new(HookSlot::new()),
        })
    }

    #[inline]
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    #[inline]
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    #[inline]
    pub fn signal(&self) -> &S {
        &self.signal
    }

    #[inline]
    pub fn state(&self) -> TraceState {
        TraceState::from_u8(self.state.load(Ordering::Acquire))
    }

    // =========================================================================
    // Control surface
    // =========================================================================

    /// Start recording.
    ///
    /// Discards anything still buffered and emits the session header: sync
    /// preamble, start, init parameters, system descriptions, system time and
    /// one info record per live thread.
    pub fn start(&self) {
        log::info!("rti: start");
        Cpu::without_interrupts(|| {
            self.ring.reset();
            self.lost_packets.store(0, Ordering::Relaxed);
            self.state
                .store(TraceState::Enabled as u8, Ordering::Release);
        });
        self.send_system_info();
    }

    /// Stop recording and let a parked drain task run down.
    pub fn stop(&self) {
        self.state
            .store(TraceState::Disabled as u8, Ordering::Release);
        log::info!("rti: stop");
        if self.drain_parked.swap(false, Ordering::AcqRel) {
            self.signal.notify();
        }
    }

    /// Re-enable the categories in `mask`, undoing one [`Tracer::disable`].
    pub fn enable(&self, mask: TraceMask) {
        Cpu::without_interrupts(|| {
            for counter in self.counters(mask) {
                let depth = counter.load(Ordering::Relaxed);
                counter.store(depth.saturating_sub(1), Ordering::Release);
            }
        });
    }

    /// Suppress the categories in `mask`. Calls nest.
    pub fn disable(&self, mask: TraceMask) {
        Cpu::without_interrupts(|| {
            for counter in self.counters(mask) {
                let depth = counter.load(Ordering::Relaxed);
                counter.store(depth.saturating_add(1), Ordering::Release);
            }
        });
    }

    fn counters(&self, mask: TraceMask) -> impl Iterator<Item = &AtomicU8> {
        self.nest
            .iter()
            .enumerate()
            .filter(move |(i, _)| mask.bits() & (1 << i) != 0)
            .map(|(_, counter)| counter)
    }

    /// Pull up to `out.len()` buffered bytes. Drain side only.
    #[inline]
    pub fn get(&self, out: &mut [u8]) -> usize {
        self.ring.get(out)
    }

    /// Bytes waiting to be drained.
    #[inline]
    pub fn used(&self) -> usize {
        self.ring.used()
    }

    /// Install the hook the drain task calls while data is pending.
    ///
    /// The hook runs without the slot locked, so it may install a
    /// replacement or clear itself.
    pub fn set_notify_hook<F>(&self, hook: F)
    where
        F: FnMut(&Pending<'_>) + Send + 'static,
    {
        self.notify.lock().replace(Some(Box::new(hook)));
    }

    pub fn clear_notify_hook(&self) {
        self.notify.lock().replace(None);
    }

    /// Snapshot of the current state.
    pub fn status(&self) -> TraceStatus {
        let mut nest = [0u8; CATEGORY_COUNT];
        for (dst, counter) in nest.iter_mut().zip(self.nest.iter()) {
            *dst = counter.load(Ordering::Acquire);
        }
        TraceStatus {
            state: self.state(),
            last_timestamp: self.last_timestamp.load(Ordering::Acquire),
            lost_packets: self.lost_packets.load(Ordering::Acquire),
            nest,
            buffered: self.ring.used(),
            capacity: self.ring.capacity(),
        }
    }

    // =========================================================================
    // Producer helpers
    // =========================================================================

    /// Whether events of `category` are currently recorded.
    #[inline]
    pub(crate) fn recording(&self, category: TraceMask) -> bool {
        self.state() != TraceState::Disabled
            && self.nest[category.index()].load(Ordering::Acquire) == 0
    }

    #[inline]
    pub(crate) fn object_id(&self, addr: usize) -> u32 {
        object_id(addr, self.config.ram_base, self.config.id_shift)
    }

    pub(crate) fn send_void(&self, id: u16) {
        let mut packet = Packet::new();
        self.send(&mut packet, id);
    }

    pub(crate) fn send_value(&self, id: u16, value: u32) {
        let mut packet = Packet::new();
        packet.value(value);
        self.send(&mut packet, id);
    }

    /// Frame, timestamp and admit one packet.
    ///
    /// The timestamp is read and `last_timestamp` updated inside the masked
    /// section, so deltas stay consistent with buffer order even when an
    /// interrupt handler records events between the two.
    pub(crate) fn send(&self, packet: &mut Packet, id: u16) {
        if self.state() == TraceState::Disabled {
            return;
        }
        packet.frame(id);

        let (transition, wake) = Cpu::without_interrupts(|| {
            let now = self.kernel.timestamp();
            let mut transition = Transition::None;

            if self.state() == TraceState::Overflow {
                match self.put_overflow(now) {
                    Some(lost) => transition = Transition::Recovered { lost },
                    None => {
                        self.lost_packets.fetch_add(1, Ordering::Relaxed);
                        return (transition, self.claim_wake());
                    }
                }
            }

            let delta = now.wrapping_sub(self.last_timestamp.load(Ordering::Relaxed));
            if self.put(packet.seal(delta)) > 0 {
                self.last_timestamp.store(now, Ordering::Release);
            } else {
                self.state
                    .store(TraceState::Overflow as u8, Ordering::Release);
                self.lost_packets.fetch_add(1, Ordering::Relaxed);
                transition = match self.put_overflow(now) {
                    Some(lost) => Transition::Recovered { lost },
                    None => Transition::EnteredOverflow,
                };
            }
            (transition, self.claim_wake())
        });

        match transition {
            Transition::None => {}
            Transition::EnteredOverflow => log::debug!("rti: trace buffer full, dropping events"),
            Transition::Recovered { lost } => {
                log::debug!("rti: recovered from overflow, {} packets lost", lost)
            }
        }
        if wake {
            self.wake_drain();
        }
    }

    /// Admit raw bytes that carry no timestamp. Used for the sync preamble.
    fn send_raw(&self, bytes: &[u8]) -> usize {
        let (written, wake) = Cpu::without_interrupts(|| (self.put(bytes), self.claim_wake()));
        if wake {
            self.wake_drain();
        }
        written
    }

    /// Copy bytes into the ring unless recording is off. Caller holds the
    /// interrupt mask.
    #[inline]
    fn put(&self, bytes: &[u8]) -> usize {
        if self.state() == TraceState::Disabled {
            return 0;
        }
        self.ring.put(bytes)
    }

    /// Try to put the overflow record. On success recording resumes and the
    /// number of lost packets it reported is returned. Caller holds the
    /// interrupt mask.
    ///
    /// The record carries its own delta as its last payload field and gets
    /// no trailing timestamp.
    fn put_overflow(&self, now: u32) -> Option<u32> {
        let lost = self.lost_packets.load(Ordering::Relaxed);
        let delta = now.wrapping_sub(self.last_timestamp.load(Ordering::Relaxed));

        let mut packet = Packet::new();
        packet.value(lost).value(delta).frame(EventId::OVERFLOW);
        if self.put(packet.as_bytes()) == 0 {
            return None;
        }

        self.state
            .store(TraceState::Enabled as u8, Ordering::Release);
        self.last_timestamp.store(now, Ordering::Release);
        self.lost_packets.store(0, Ordering::Relaxed);
        Some(lost)
    }

    /// Take the parked drain task's wake-up if the fill level is past the
    /// watermark. Caller holds the interrupt mask.
    #[inline]
    fn claim_wake(&self) -> bool {
        self.ring.used() > self.config.watermark()
            && self.drain_parked.swap(false, Ordering::AcqRel)
    }

    /// Resume the drain task without recording the scheduler activity the
    /// resume itself causes.
    fn wake_drain(&self) {
        self.disable(TraceMask::ALL);
        self.signal.notify();
        self.enable(TraceMask::ALL);
    }

    // =========================================================================
    // Session header
    // =========================================================================

    fn send_system_info(&self) {
        self.send_raw(&SYNC_PREAMBLE);
        self.send_void(EventId::START);

        let mut packet = Packet::new();
        packet
            .value(self.config.sys_freq)
            .value(self.config.cpu_freq)
            .value(self.config.ram_base as u32)
            .value(self.config.id_shift);
        self.send(&mut packet, EventId::INIT);

        let mut names = crate::print::FmtBuffer::<{ crate::print::FMT_BUFFER_SIZE }>::new();
        let _ = core::fmt::write(
            &mut names,
            format_args!("N={},O={}", self.config.app_name, self.config.os_name),
        );
        self.send_sys_desc(names.as_str());
        for desc in self.config.sys_desc {
            self.send_sys_desc(desc);
        }

        self.send_system_time();

        let idle = self.kernel.idle_thread();
        self.kernel.for_each_thread(&mut |thread| {
            if thread.addr != idle {
                self.send_thread_info(thread);
            }
        });
    }

    fn send_sys_desc(&self, desc: &str) {
        let mut packet = Packet::new();
        packet.string(desc, self.config.max_string_len);
        self.send(&mut packet, EventId::SYSDESC);
    }

    fn send_system_time(&self) {
        let ms = self.kernel.system_time_ms();
        let mut packet = Packet::new();
        packet.value(ms as u32).value((ms >> 32) as u32);
        self.send(&mut packet, EventId::SYSTIME_CYCLES);
    }

    /// Thread-info record followed by its stack-info record.
    pub(crate) fn send_thread_info(&self, thread: &ThreadInfo<'_>) {
        let id = self.object_id(thread.addr);

        let mut packet = Packet::new();
        packet
            .value(id)
            .value(thread.priority)
            .string(thread.name, self.config.thread_name_max);
        self.send(&mut packet, EventId::THREAD_INFO);

        let mut packet = Packet::new();
        packet
            .value(id)
            .value(thread.stack_addr as u32)
            .value(thread.stack_size)
            .value(0);
        self.send(&mut packet, EventId::STACK_INFO);
    }
}
