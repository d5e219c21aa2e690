//! Formatted-print records.
//!
//! Text shows up in the viewer's terminal window and on the timeline at the
//! moment it was recorded. Formatting happens into a stack buffer so the
//! path stays usable from interrupt handlers.

use core::fmt;

use crate::drain::DrainSignal;
use crate::kernel::Kernel;
use crate::packet::{string_room, EventId, Packet};
use crate::tracer::Tracer;

/// Longest message a print record carries: the payload minus the string
/// prefix and room for the level and trailing zero.
pub const MAX_PRINT_LEN: usize = string_room(2);

/// Size of the formatting buffer behind [`Tracer::print_fmt`].
pub const FMT_BUFFER_SIZE: usize = MAX_PRINT_LEN;

/// Severity shown by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrintLevel {
    Log = 0,
    Warning = 1,
    Error = 2,
}

/// Fixed-capacity `fmt::Write` sink. Output past the capacity is dropped at a
/// character boundary.
pub struct FmtBuffer<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> FmtBuffer<N> {
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }
}

impl<const N: usize> Default for FmtBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Write for FmtBuffer<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = N - self.len;
        let mut take = s.len().min(remaining);
        while !s.is_char_boundary(take) {
            take -= 1;
        }

        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;

        if take < s.len() {
            Err(fmt::Error)
        } else {
            Ok(())
        }
    }
}

impl<K: Kernel, S: DrainSignal> Tracer<K, S> {
    /// Record `msg`, truncated to the configured string limit and never
    /// past [`MAX_PRINT_LEN`].
    pub fn print(&self, msg: &str, level: PrintLevel) {
        let mut packet = Packet::new();
        packet
            .string(msg, self.config.max_string_len.min(MAX_PRINT_LEN))
            .value(level as u32)
            .value(0);
        self.send(&mut packet, EventId::PRINT_FORMATTED);
    }

    /// Format and record a message.
    pub fn print_fmt(&self, level: PrintLevel, args: fmt::Arguments<'_>) {
        let mut text = FmtBuffer::<FMT_BUFFER_SIZE>::new();
        // Truncation is reported as an error; keep what fit.
        let _ = fmt::write(&mut text, args);
        self.print(text.as_str(), level);
    }
}
