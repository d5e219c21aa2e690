//! Packet framing.
//!
//! A packet is an event id, a payload and a trailing timestamp delta:
//!
//! ```text
//! id < 24:   [id][payload .......][delta varint]
//! id >= 24:  [id 1-2B][len 1-2B][payload .......][delta varint]
//! ```
//!
//! Ids below 24 have a fixed payload shape known to the viewer and carry no
//! length. Larger ids are self-describing. Ids and lengths above 127 take two
//! bytes: the low seven bits with bit 7 set, then the value shifted right by 7.
//!
//! Packets are built in a fixed stack buffer with room reserved in front of
//! the payload, so the header is written after the payload length is known
//! without moving any bytes.

use crate::codec::{self, MAX_PREFIX_LEN, MAX_VALUE_LEN};

/// Event identifiers understood by the viewer.
///
/// Ids 0..=31 follow the SystemView numbering; sync-object ids are grouped
/// per object class in blocks of ten.
pub struct EventId;

impl EventId {
    pub const NOP: u16 = 0;
    pub const OVERFLOW: u16 = 1;
    pub const ISR_ENTER: u16 = 2;
    pub const ISR_EXIT: u16 = 3;
    pub const THREAD_START_EXEC: u16 = 4;
    pub const THREAD_STOP_EXEC: u16 = 5;
    pub const THREAD_START_READY: u16 = 6;
    pub const THREAD_STOP_READY: u16 = 7;
    pub const THREAD_CREATE: u16 = 8;
    pub const THREAD_INFO: u16 = 9;
    pub const START: u16 = 10;
    pub const STOP: u16 = 11;
    pub const SYSTIME_CYCLES: u16 = 12;
    pub const SYSTIME_US: u16 = 13;
    pub const SYSDESC: u16 = 14;
    pub const USER_START: u16 = 15;
    pub const USER_STOP: u16 = 16;
    pub const IDLE: u16 = 17;
    pub const ISR_TO_SCHEDULER: u16 = 18;
    pub const TIMER_ENTER: u16 = 19;
    pub const TIMER_EXIT: u16 = 20;
    pub const STACK_INFO: u16 = 21;
    pub const MODULE_DESC: u16 = 22;

    pub const INIT: u16 = 24;
    pub const NAME_RESOURCE: u16 = 25;
    pub const PRINT_FORMATTED: u16 = 26;
    pub const NUM_MODULES: u16 = 27;
    pub const END_CALL: u16 = 28;
    pub const THREAD_TERMINATE: u16 = 29;

    pub const EX: u16 = 31;

    pub const SEM_BASE: u16 = 40;
    pub const MUTEX_BASE: u16 = 50;
    pub const EVENT_BASE: u16 = 60;
    pub const MAILBOX_BASE: u16 = 70;
    pub const QUEUE_BASE: u16 = 80;

    /// Offsets within an object-class block.
    pub const TRY_TAKE: u16 = 1;
    pub const TAKEN: u16 = 2;
    pub const RELEASE: u16 = 3;

    /// Ids below this use single-byte framing without a length field.
    pub const FIRST_LENGTH_PREFIXED: u16 = 24;

    /// Largest id the two-byte header form can carry.
    pub const MAX: u16 = 0x3FFF;
}

/// Room reserved in front of the payload for the header.
pub const HEADER_RESERVE: usize = 4;

/// Largest payload a single packet can carry.
pub const MAX_PAYLOAD: usize = 160;

/// Longest string a payload can hold while keeping room for `values` varint
/// fields after it.
#[inline]
pub const fn string_room(values: usize) -> usize {
    MAX_PAYLOAD - MAX_PREFIX_LEN - values * MAX_VALUE_LEN
}

/// Size of the packet scratch buffer.
pub const PACKET_CAPACITY: usize = HEADER_RESERVE + MAX_PAYLOAD + MAX_VALUE_LEN;

/// Encoded packet header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    bytes: [u8; HEADER_RESERVE],
    len: u8,
}

impl Header {
    /// Build the header for event `id` carrying `payload_len` bytes.
    pub fn new(id: u16, payload_len: usize) -> Self {
        debug_assert!(id <= EventId::MAX);
        let mut bytes = [0u8; HEADER_RESERVE];
        let mut len = 0;
        if id < EventId::FIRST_LENGTH_PREFIXED {
            bytes[0] = id as u8;
            len = 1;
        } else {
            len += push_short(&mut bytes[len..], id as usize);
            len += push_short(&mut bytes[len..], payload_len);
        }
        Self {
            bytes,
            len: len as u8,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// One- or two-byte header field.
fn push_short(out: &mut [u8], value: usize) -> usize {
    if value > 0x7F {
        out[0] = (value as u8) | 0x80;
        out[1] = (value >> 7) as u8;
        2
    } else {
        out[0] = value as u8;
        1
    }
}

/// A packet under construction.
///
/// Payload fields are appended with [`Packet::value`] and
/// [`Packet::string`]. [`Packet::frame`] then prepends the header, and
/// [`Packet::seal`] appends the timestamp delta.
#[derive(Clone)]
pub struct Packet {
    buf: [u8; PACKET_CAPACITY],
    start: usize,
    end: usize,
    body_end: usize,
}

impl Packet {
    /// Create an empty packet.
    #[inline]
    pub const fn new() -> Self {
        Self {
            buf: [0; PACKET_CAPACITY],
            start: HEADER_RESERVE,
            end: HEADER_RESERVE,
            body_end: HEADER_RESERVE,
        }
    }

    /// Room left for payload fields.
    #[inline]
    fn payload_room(&mut self) -> &mut [u8] {
        &mut self.buf[self.end..HEADER_RESERVE + MAX_PAYLOAD]
    }

    /// Append a varint field.
    #[inline]
    pub fn value(&mut self, value: u32) -> &mut Self {
        let n = codec::write_value(self.payload_room(), value);
        self.end += n;
        self
    }

    /// Append a string field truncated to `max_len` bytes.
    #[inline]
    pub fn string(&mut self, s: &str, max_len: usize) -> &mut Self {
        let n = codec::write_string(self.payload_room(), s.as_bytes(), max_len);
        self.end += n;
        self
    }

    /// Payload bytes written so far.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        let end = if self.start < HEADER_RESERVE {
            self.body_end
        } else {
            self.end
        };
        &self.buf[HEADER_RESERVE..end]
    }

    /// Prepend the header for event `id`.
    ///
    /// Must be called once, after the payload is complete.
    pub fn frame(&mut self, id: u16) -> &mut Self {
        let header = Header::new(id, self.end - HEADER_RESERVE);
        let bytes = header.as_bytes();
        self.start = HEADER_RESERVE - bytes.len();
        self.buf[self.start..HEADER_RESERVE].copy_from_slice(bytes);
        self.body_end = self.end;
        self
    }

    /// Append the timestamp delta.
    ///
    /// Sealing twice replaces the previous delta.
    pub fn seal(&mut self, delta: u32) -> &[u8] {
        let encoded = codec::encode_value(delta);
        self.end = self.body_end + encoded.len();
        self.buf[self.body_end..self.end].copy_from_slice(&encoded);
        self.as_bytes()
    }

    /// Framed bytes, including the delta once sealed.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame `payload` as event `id` with the given timestamp delta.
///
/// Convenience form of [`Packet`] used for one-off packets.
pub fn assemble(id: u16, payload: &[u8], delta: u32, out: &mut [u8]) -> usize {
    let header = Header::new(id, payload.len());
    let encoded = codec::encode_value(delta);
    let total = header.as_bytes().len() + payload.len() + encoded.len();
    if out.len() < total {
        return 0;
    }
    let (head, rest) = out.split_at_mut(header.as_bytes().len());
    head.copy_from_slice(header.as_bytes());
    let (body, tail) = rest.split_at_mut(payload.len());
    body.copy_from_slice(payload);
    tail[..encoded.len()].copy_from_slice(&encoded);
    total
}
