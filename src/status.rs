//! Trace state, category masks and the diagnostic status snapshot.

use core::fmt;

use bitflags::bitflags;

/// Number of independently maskable event categories.
pub const CATEGORY_COUNT: usize = 9;

bitflags! {
    /// Event categories for [`crate::Tracer::enable`] and
    /// [`crate::Tracer::disable`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraceMask: u16 {
        const SEMAPHORE = 1 << 0;
        const MUTEX = 1 << 1;
        const EVENT = 1 << 2;
        const MAILBOX = 1 << 3;
        const QUEUE = 1 << 4;
        const THREAD = 1 << 5;
        const SCHEDULER = 1 << 6;
        const INTERRUPT = 1 << 7;
        const TIMER = 1 << 8;
        const ALL = 0x01FF;
    }
}

impl TraceMask {
    /// Nest-counter index of a single-category mask.
    #[inline]
    pub const fn index(self) -> usize {
        self.bits().trailing_zeros() as usize
    }
}

/// Global recording state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TraceState {
    /// Nothing is recorded.
    Disabled = 0,
    /// Events flow into the buffer.
    Enabled = 1,
    /// The buffer refused a packet; events are counted as lost until an
    /// overflow record gets through.
    Overflow = 2,
}

impl TraceState {
    #[inline]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => TraceState::Enabled,
            2 => TraceState::Overflow,
            _ => TraceState::Disabled,
        }
    }
}

impl fmt::Display for TraceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceState::Disabled => write!(f, "disabled"),
            TraceState::Enabled => write!(f, "enabled"),
            TraceState::Overflow => write!(f, "overflow"),
        }
    }
}

/// Point-in-time copy of the tracer's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceStatus {
    pub state: TraceState,
    pub last_timestamp: u32,
    pub lost_packets: u32,
    pub nest: [u8; CATEGORY_COUNT],
    pub buffered: usize,
    pub capacity: usize,
}

impl TraceStatus {
    /// Disable depth of one category.
    pub fn nest_of(&self, category: TraceMask) -> u8 {
        self.nest[category.index()]
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rti {}: {}/{} bytes buffered, {} lost, last ts {:#010x}, nest [",
            self.state, self.buffered, self.capacity, self.lost_packets, self.last_timestamp
        )?;
        for (i, depth) in self.nest.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", depth)?;
        }
        write!(f, "]")
    }
}
