//! Variable-length unsigned integers
//!
//! Each byte carries 7 value bits, most significant group first. The high bit
//! of a byte is set when more bytes follow. `300` encodes as `82 2C`.
//!
//! Every integer field of an update record (server id, shard index, key and
//! value lengths) goes through this one pair of routines, so they share a
//! single truncation rule: a buffer that ends on a byte with the continuation
//! bit set is corrupt.

use super::errors::{UlogError, UlogResult};

/// Maximum number of bytes a `u64` can occupy.
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;
const VALUE_MASK: u8 = 0x7F;

/// Returns the number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Appends the encoding of `value` to `buf`.
pub fn write_varint(buf: &mut Vec<u8>, value: u64) {
    let len = encoded_len(value);
    for i in (0..len).rev() {
        let group = ((value >> (i * 7)) as u8) & VALUE_MASK;
        if i > 0 {
            buf.push(group | CONTINUATION);
        } else {
            buf.push(group);
        }
    }
}

/// Reads one varint from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
///
/// Returns `KV_ULOG_CORRUPTION` if the buffer ends before the final byte, or
/// if the value does not fit in 64 bits.
pub fn read_varint(data: &[u8]) -> UlogResult<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if value > (u64::MAX >> 7) {
            return Err(UlogError::corruption("varint overflows 64 bits"));
        }
        value = (value << 7) | u64::from(byte & VALUE_MASK);
        if byte & CONTINUATION == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(UlogError::corruption(format!(
        "truncated varint after {} bytes",
        data.len()
    )))
}
