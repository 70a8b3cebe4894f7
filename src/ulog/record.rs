//! Update record encoding
//!
//! Record layout (all integers are varints, see `varint.rs`):
//!
//! ```text
//! record := opcode(1 byte) server_id shard_index body
//! opcode := 0xA1 SET | 0xA2 REMOVE | 0xA3 CLEAR
//! SET    := key_len value_len key value
//! REMOVE := key_len key
//! CLEAR  := (empty)
//! ```
//!
//! These bytes are the only form a record ever takes outside a single
//! notification call. Two processes replicate only if they agree on them
//! byte for byte.
//!
//! Decoding is split in two stages. `scan_header` reads the opcode byte and
//! both ids without judging the opcode, so a replay filter can reject a record
//! before anything else about it matters. `decode_body` then parses the
//! payload for a validated opcode.

use std::fmt;

use super::errors::{UlogError, UlogResult};
use super::varint::{encoded_len, read_varint, write_varint};

/// Record opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Key set to a value (insert or overwrite)
    Set = 0xA1,
    /// Key removed
    Remove = 0xA2,
    /// All keys removed
    Clear = 0xA3,
}

impl OpCode {
    /// Convert from u8, returns None for unknown opcodes
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0xA1 => Some(OpCode::Set),
            0xA2 => Some(OpCode::Remove),
            0xA3 => Some(OpCode::Clear),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the textual name used in human-readable logs
    pub fn as_str(self) -> &'static str {
        match self {
            OpCode::Set => "SET",
            OpCode::Remove => "REMOVE",
            OpCode::Clear => "CLEAR",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single store mutation.
///
/// Borrows its key and value; a decoded mutation points into the record
/// buffer it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation<'a> {
    /// Set `key` to `value`
    Set { key: &'a [u8], value: &'a [u8] },
    /// Remove `key`
    Remove { key: &'a [u8] },
    /// Remove every key
    Clear,
}

impl<'a> Mutation<'a> {
    /// Assemble a mutation from loose parts.
    ///
    /// # Errors
    ///
    /// Returns `KV_ULOG_INVALID_RECORD` when the parts do not fit the opcode:
    /// SET needs a key and a value, REMOVE needs a key and no value, CLEAR
    /// takes neither.
    pub fn from_parts(
        op: OpCode,
        key: Option<&'a [u8]>,
        value: Option<&'a [u8]>,
    ) -> UlogResult<Self> {
        match (op, key, value) {
            (OpCode::Set, Some(key), Some(value)) => Ok(Mutation::Set { key, value }),
            (OpCode::Remove, Some(key), None) => Ok(Mutation::Remove { key }),
            (OpCode::Clear, None, None) => Ok(Mutation::Clear),
            (op, key, value) => Err(UlogError::invalid_record(format!(
                "{} with key={} value={}",
                op,
                key.is_some(),
                value.is_some()
            ))),
        }
    }

    /// Returns the opcode for this mutation
    pub fn op(&self) -> OpCode {
        match self {
            Mutation::Set { .. } => OpCode::Set,
            Mutation::Remove { .. } => OpCode::Remove,
            Mutation::Clear => OpCode::Clear,
        }
    }

    /// Returns the key, if the mutation has one
    pub fn key(&self) -> Option<&'a [u8]> {
        match self {
            Mutation::Set { key, .. } | Mutation::Remove { key } => Some(key),
            Mutation::Clear => None,
        }
    }
}

/// Encode a mutation tagged with the writer's ids.
pub fn encode_record(mutation: &Mutation<'_>, server_id: u64, shard_index: u64) -> Vec<u8> {
    let body_len = match mutation {
        Mutation::Set { key, value } => {
            encoded_len(key.len() as u64)
                + encoded_len(value.len() as u64)
                + key.len()
                + value.len()
        }
        Mutation::Remove { key } => encoded_len(key.len() as u64) + key.len(),
        Mutation::Clear => 0,
    };
    let mut buf =
        Vec::with_capacity(1 + encoded_len(server_id) + encoded_len(shard_index) + body_len);

    buf.push(mutation.op().as_u8());
    write_varint(&mut buf, server_id);
    write_varint(&mut buf, shard_index);

    match mutation {
        Mutation::Set { key, value } => {
            write_varint(&mut buf, key.len() as u64);
            write_varint(&mut buf, value.len() as u64);
            buf.extend_from_slice(key);
            buf.extend_from_slice(value);
        }
        Mutation::Remove { key } => {
            write_varint(&mut buf, key.len() as u64);
            buf.extend_from_slice(key);
        }
        Mutation::Clear => {}
    }

    buf
}

/// Encode a record from loose parts.
///
/// # Errors
///
/// Returns `KV_ULOG_INVALID_RECORD` for combinations `Mutation::from_parts`
/// rejects.
pub fn encode(
    op: OpCode,
    server_id: u64,
    shard_index: u64,
    key: Option<&[u8]>,
    value: Option<&[u8]>,
) -> UlogResult<Vec<u8>> {
    let mutation = Mutation::from_parts(op, key, value)?;
    Ok(encode_record(&mutation, server_id, shard_index))
}

/// Leading part of a record: opcode byte and writer ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Raw opcode byte, not yet validated
    pub opcode: u8,
    /// Id of the writer that produced the record
    pub server_id: u64,
    /// Partition of the writer that produced the record
    pub shard_index: u64,
    /// Number of bytes the header occupies
    pub header_len: usize,
}

impl RecordHeader {
    /// Validate the opcode byte.
    ///
    /// # Errors
    ///
    /// Returns `KV_ULOG_CORRUPTION` for an unknown opcode.
    pub fn op(&self) -> UlogResult<OpCode> {
        OpCode::from_u8(self.opcode)
            .ok_or_else(|| UlogError::corruption(format!("unknown opcode 0x{:02X}", self.opcode)))
    }
}

/// Read the opcode byte and both ids without validating the opcode.
///
/// # Errors
///
/// Returns `KV_ULOG_CORRUPTION` for an empty buffer or a truncated id.
pub fn scan_header(data: &[u8]) -> UlogResult<RecordHeader> {
    let (&opcode, rest) = data
        .split_first()
        .ok_or_else(|| UlogError::corruption("empty record"))?;
    let (server_id, server_len) = read_varint(rest)?;
    let (shard_index, shard_len) = read_varint(&rest[server_len..])?;

    Ok(RecordHeader {
        opcode,
        server_id,
        shard_index,
        header_len: 1 + server_len + shard_len,
    })
}

/// Read and validate a record header.
///
/// # Errors
///
/// Returns `KV_ULOG_CORRUPTION` for an empty buffer, an unknown opcode or a
/// truncated id.
pub fn decode_header(data: &[u8]) -> UlogResult<(OpCode, RecordHeader)> {
    let header = scan_header(data)?;
    let op = header.op()?;
    Ok((op, header))
}

/// Parse the payload that follows a header.
///
/// `body` must be exactly the bytes after the header; leftovers are corrupt.
///
/// # Errors
///
/// Returns `KV_ULOG_CORRUPTION` if a length varint is truncated, a declared
/// length exceeds the bytes present, or bytes remain after the payload.
pub fn decode_body(op: OpCode, body: &[u8]) -> UlogResult<Mutation<'_>> {
    let mut pos = 0;
    let mutation = match op {
        OpCode::Set => {
            let key_len = read_len(body, &mut pos, "key")?;
            let value_len = read_len(body, &mut pos, "value")?;
            let key = take(body, &mut pos, key_len, "key")?;
            let value = take(body, &mut pos, value_len, "value")?;
            Mutation::Set { key, value }
        }
        OpCode::Remove => {
            let key_len = read_len(body, &mut pos, "key")?;
            let key = take(body, &mut pos, key_len, "key")?;
            Mutation::Remove { key }
        }
        OpCode::Clear => Mutation::Clear,
    };

    if pos != body.len() {
        return Err(UlogError::corruption(format!(
            "{} bytes trailing a {} record",
            body.len() - pos,
            op
        )));
    }

    Ok(mutation)
}

/// A fully decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    /// Id of the writer that produced the record
    pub server_id: u64,
    /// Partition of the writer that produced the record
    pub shard_index: u64,
    /// The mutation carried by the record
    pub mutation: Mutation<'a>,
}

/// Decode a complete record.
///
/// # Errors
///
/// Returns `KV_ULOG_CORRUPTION` on any malformed or truncated input.
pub fn decode_record(data: &[u8]) -> UlogResult<DecodedRecord<'_>> {
    let (op, header) = decode_header(data)?;
    let mutation = decode_body(op, &data[header.header_len..])?;
    Ok(DecodedRecord {
        server_id: header.server_id,
        shard_index: header.shard_index,
        mutation,
    })
}

fn read_len(body: &[u8], pos: &mut usize, what: &str) -> UlogResult<usize> {
    let (len, consumed) = read_varint(&body[*pos..])
        .map_err(|e| UlogError::corruption(format!("{} length: {}", what, e)))?;
    *pos += consumed;
    usize::try_from(len)
        .map_err(|_| UlogError::corruption(format!("{} length {} is not addressable", what, len)))
}

fn take<'a>(body: &'a [u8], pos: &mut usize, len: usize, what: &str) -> UlogResult<&'a [u8]> {
    let available = body.len() - *pos;
    if len > available {
        return Err(UlogError::corruption(format!(
            "{} declares {} bytes, {} available",
            what, len, available
        )));
    }
    let slice = &body[*pos..*pos + len];
    *pos += len;
    Ok(slice)
}
