//! Update logging subsystem
//!
//! Turns store mutations into notifications, notifications into records, and
//! records back into mutations on another store.
//!
//! # Pieces
//!
//! - `record`: the binary record codec (bit-exact wire format)
//! - `UpdateLogger`: the notification capability a store calls into
//! - `BufferLogger`, `MirrorLogger`, `ForwardingLogger`, `QueueLogger`: its
//!   implementations
//! - `replay`: decode, filter and apply a record to a store
//!
//! # Guarantees
//!
//! - decode(encode(m, s, d)) reproduces (m, s, d)
//! - Every strictly shorter prefix of a record is corrupt
//! - A record filtered out is never judged corrupt
//! - A record that fails to decode never mutates the store

mod buffer;
mod errors;
mod forward;
mod logger;
mod mirror;
mod queue_logger;
pub mod record;
pub mod replay;
pub mod varint;

pub use buffer::BufferLogger;
pub use errors::{UlogError, UlogResult};
pub use forward::ForwardingLogger;
pub use logger::UpdateLogger;
pub use mirror::MirrorLogger;
pub use queue_logger::QueueLogger;
pub use record::{
    decode_body, decode_header, decode_record, encode, encode_record, scan_header,
    DecodedRecord, Mutation, OpCode, RecordHeader,
};
pub use replay::{apply_mutation, apply_record, remove_idempotent, ApplyOutcome, RecordFilter};
