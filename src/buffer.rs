//! Byte ring buffer between trace producers and the drain task.
//!
//! Single writer, single reader. The writer is whoever holds the interrupt
//! mask (see [`crate::arch::CpuOps`]); the reader is the drain task. Neither
//! side takes a lock.
//!
//! # Design
//!
//! - Power-of-2 capacity so indices wrap with a bitmask
//! - Free-running `head`/`tail` indices; fill level is `tail - head`
//! - All-or-nothing admission: a packet is either copied whole or refused
//! - Storage cells are atomic bytes, so a reader racing a [`RingBuffer::reset`]
//!   sees stale bytes rather than undefined behavior
//!
//! ```text
//!            head                 tail
//!             v                    v
//! +----------+--------------------+-----------+
//! |   free   |  pending (used())  |   free    |
//! +----------+--------------------+-----------+
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::error::TraceError;

/// Fixed-capacity byte ring.
pub struct RingBuffer {
    /// Backing storage, `capacity` cells.
    storage: Box<[AtomicU8]>,

    /// `capacity - 1`.
    mask: usize,

    /// Read index, advanced only by the consumer (and by `reset`).
    head: AtomicUsize,

    /// Write index, advanced only by the producer.
    tail: AtomicUsize,
}

impl RingBuffer {
    /// Allocate a ring of `capacity` bytes.
    ///
    /// `capacity` must be a power of two.
    pub fn with_capacity(capacity: usize) -> Result<Self, TraceError> {
        debug_assert!(
            capacity.is_power_of_two(),
            "trace buffer size must be a power of 2"
        );

        let mut cells = Vec::new();
        cells
            .try_reserve_exact(capacity)
            .map_err(|_| TraceError::OutOfMemory {
                requested: capacity,
            })?;
        cells.extend((0..capacity).map(|_| AtomicU8::new(0)));

        Ok(Self {
            storage: cells.into_boxed_slice(),
            mask: capacity.wrapping_sub(1),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        })
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes waiting to be read.
    #[inline]
    pub fn used(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    /// Bytes that can still be written.
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Copy `bytes` into the ring if free space exceeds their length.
    ///
    /// Returns the number of bytes written: either `bytes.len()` or 0. Nothing
    /// is written on refusal.
    ///
    /// Producer side. Callers serialize through the interrupt mask; two
    /// concurrent writers would interleave their bytes.
    pub fn put(&self, bytes: &[u8]) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let free = self.capacity() - tail.wrapping_sub(head);
        if free <= bytes.len() {
            return 0;
        }

        for (i, &byte) in bytes.iter().enumerate() {
            self.storage[tail.wrapping_add(i) & self.mask].store(byte, Ordering::Relaxed);
        }
        self.tail
            .store(tail.wrapping_add(bytes.len()), Ordering::Release);
        bytes.len()
    }

    /// Move up to `out.len()` pending bytes into `out`.
    ///
    /// Consumer side. Returns 0 when the ring is empty or when a concurrent
    /// [`RingBuffer::reset`] discarded the bytes being read.
    pub fn get(&self, out: &mut [u8]) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let count = core::cmp::min(tail.wrapping_sub(head), out.len());
        if count == 0 {
            return 0;
        }

        for (i, slot) in out[..count].iter_mut().enumerate() {
            *slot = self.storage[head.wrapping_add(i) & self.mask].load(Ordering::Relaxed);
        }

        match self.head.compare_exchange(
            head,
            head.wrapping_add(count),
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => count,
            Err(_) => 0,
        }
    }

    /// Discard all pending bytes.
    ///
    /// Producer side, called with the interrupt mask held.
    pub fn reset(&self) {
        let tail = self.tail.load(Ordering::Relaxed);
        self.head.store(tail, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Admission
    // =========================================================================

    #[test]
    fn test_put_requires_strictly_more_free_space() {
        let ring = RingBuffer::with_capacity(16).unwrap();
        assert_eq!(ring.put(&[1; 15]), 15);
        assert_eq!(ring.used(), 15);
        assert_eq!(ring.free(), 1);

        // One free byte cannot admit a one-byte packet.
        assert_eq!(ring.put(&[2]), 0);
        assert_eq!(ring.used(), 15);
    }

    #[test]
    fn test_put_refusal_writes_nothing() {
        let ring = RingBuffer::with_capacity(8).unwrap();
        assert_eq!(ring.put(&[1, 2, 3, 4, 5]), 5);
        assert_eq!(ring.put(&[6, 7, 8]), 0);

        let mut out = [0u8; 8];
        assert_eq!(ring.get(&mut out), 5);
        assert_eq!(&out[..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_put_always_fits() {
        let ring = RingBuffer::with_capacity(4).unwrap();
        assert_eq!(ring.put(&[]), 0);
        assert_eq!(ring.used(), 0);
    }

    // =========================================================================
    // Draining
    // =========================================================================

    #[test]
    fn test_get_wraps_around_end() {
        let ring = RingBuffer::with_capacity(8).unwrap();
        let mut out = [0u8; 8];

        assert_eq!(ring.put(&[0xAA; 6]), 6);
        assert_eq!(ring.get(&mut out[..6]), 6);

        // Tail is now at 6; this write spans the end of storage.
        assert_eq!(ring.put(&[1, 2, 3, 4, 5]), 5);
        assert_eq!(ring.get(&mut out), 5);
        assert_eq!(&out[..5], &[1, 2, 3, 4, 5]);
        assert_eq!(ring.used(), 0);
    }

    #[test]
    fn test_partial_get() {
        let ring = RingBuffer::with_capacity(16).unwrap();
        ring.put(&[1, 2, 3, 4, 5, 6]);

        let mut out = [0u8; 4];
        assert_eq!(ring.get(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(ring.used(), 2);
        assert_eq!(ring.get(&mut out), 2);
        assert_eq!(&out[..2], &[5, 6]);
    }

    #[test]
    fn test_get_from_empty() {
        let ring = RingBuffer::with_capacity(16).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(ring.get(&mut out), 0);
    }

    #[test]
    fn test_reset_discards_pending() {
        let ring = RingBuffer::with_capacity(16).unwrap();
        ring.put(&[9; 10]);
        ring.reset();
        assert_eq!(ring.used(), 0);
        assert_eq!(ring.free(), 16);

        ring.put(&[7, 8]);
        let mut out = [0u8; 4];
        assert_eq!(ring.get(&mut out), 2);
        assert_eq!(&out[..2], &[7, 8]);
    }

    #[test]
    fn test_many_wraps_preserve_order() {
        let ring = RingBuffer::with_capacity(32).unwrap();
        let mut next = 0u8;
        let mut expect = 0u8;
        let mut out = [0u8; 7];
        for _ in 0..200 {
            let chunk = [next, next.wrapping_add(1), next.wrapping_add(2)];
            if ring.put(&chunk) == 3 {
                next = next.wrapping_add(3);
            }
            let n = ring.get(&mut out);
            for &b in &out[..n] {
                assert_eq!(b, expect);
                expect = expect.wrapping_add(1);
            }
        }
    }
}
