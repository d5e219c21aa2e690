//! Wire encoding for values and strings.
//!
//! Every integer in the stream is a little-endian base-128 varint: seven bits
//! per byte, low-order group first, bit 7 set on every byte except the last.
//! A `u32` therefore occupies between 1 and 5 bytes.
//!
//! Strings are raw bytes behind a length prefix. Lengths below 255 take a
//! single byte; longer strings use the sentinel `0xFF` followed by the length
//! as a 16-bit little-endian value.
//!
//! ```text
//!   300  ->  AC 02        (0b1_0101100, 0b0_0000010)
//!   "rdb" -> 03 72 64 62
//! ```

use core::ops::Deref;

/// Maximum encoded size of a `u32` varint.
pub const MAX_VALUE_LEN: usize = 5;

/// Maximum size of a string length prefix.
pub const MAX_PREFIX_LEN: usize = 3;

/// Prefix byte announcing a 16-bit string length.
const LONG_STRING_SENTINEL: u8 = 0xFF;

/// An encoded varint held inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Varint {
    bytes: [u8; MAX_VALUE_LEN],
    len: u8,
}

impl Deref for Varint {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// Encode `value` as a varint.
#[inline]
pub const fn encode_value(mut value: u32) -> Varint {
    let mut bytes = [0u8; MAX_VALUE_LEN];
    let mut len = 0;
    while value > 0x7F {
        bytes[len] = (value as u8) | 0x80;
        value >>= 7;
        len += 1;
    }
    bytes[len] = value as u8;
    Varint {
        bytes,
        len: (len + 1) as u8,
    }
}

/// Decode a varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` if the input
/// ends before the terminating byte or runs past five bytes.
pub fn decode_value(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &byte) in bytes.iter().enumerate().take(MAX_VALUE_LEN) {
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Number of raw bytes `encode_string` keeps from a string of `len` bytes.
#[inline]
pub const fn string_len(len: usize, max_len: usize) -> usize {
    if len < max_len {
        len
    } else {
        max_len
    }
}

/// Write a varint into `out`, returning the bytes written.
///
/// Writes nothing and returns 0 if `out` is too short.
#[inline]
pub fn write_value(out: &mut [u8], value: u32) -> usize {
    let encoded = encode_value(value);
    match out.get_mut(..encoded.len()) {
        Some(dst) => {
            dst.copy_from_slice(&encoded);
            encoded.len()
        }
        None => 0,
    }
}

/// Write a length-prefixed string into `out`, returning the bytes written.
///
/// The string is truncated to `max_len` bytes and then further to whatever
/// fits in `out` after the prefix.
pub fn write_string(out: &mut [u8], s: &[u8], max_len: usize) -> usize {
    const SHORT_MAX: usize = LONG_STRING_SENTINEL as usize - 1;

    let mut len = string_len(s.len(), max_len);
    let mut prefix_len = if len <= SHORT_MAX { 1 } else { MAX_PREFIX_LEN };
    if prefix_len + len > out.len() {
        if out.is_empty() {
            return 0;
        }
        let room = out.len().saturating_sub(MAX_PREFIX_LEN);
        if room > SHORT_MAX {
            prefix_len = MAX_PREFIX_LEN;
            len = room;
        } else {
            prefix_len = 1;
            len = string_len(out.len() - 1, SHORT_MAX);
        }
    }

    if prefix_len == 1 {
        out[0] = len as u8;
    } else {
        out[0] = LONG_STRING_SENTINEL;
        out[1] = (len & 0xFF) as u8;
        out[2] = ((len >> 8) & 0xFF) as u8;
    }
    out[prefix_len..prefix_len + len].copy_from_slice(&s[..len]);
    prefix_len + len
}

/// Decode a length-prefixed string from the front of `bytes`.
///
/// Returns the raw string bytes and the number of bytes consumed.
pub fn decode_string(bytes: &[u8]) -> Option<(&[u8], usize)> {
    let (&first, rest) = bytes.split_first()?;
    let (len, prefix_len) = if first == LONG_STRING_SENTINEL {
        let lo = *rest.first()? as usize;
        let hi = *rest.get(1)? as usize;
        (lo | (hi << 8), 3)
    } else {
        (first as usize, 1)
    };
    let body = bytes.get(prefix_len..prefix_len + len)?;
    Some((body, prefix_len + len))
}
