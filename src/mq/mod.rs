//! Message queue subsystem
//!
//! A file-backed, append-only queue of timestamped records. One writer
//! appends; any number of readers tail it with their own cursors.
//!
//! # Guarantees
//!
//! - Total order per queue; timestamps never decrease
//! - A frame is fully written before readers can see it
//! - Every frame carries a CRC32; damage is reported, never skipped
//! - Closing the queue cancels every blocked read
//!
//! # Layout
//!
//! Segments are files named `<prefix>.<index>`; a new one is started once the
//! active segment reaches `max_file_size`.

mod config;
mod errors;
mod frame;
mod queue;
mod reader;

pub use config::{OpenMode, QueueConfig};
pub use errors::{MqError, MqResult};
pub use frame::{encode_frame, read_frame, Frame, FrameRead, FRAME_OVERHEAD};
pub use queue::MessageQueue;
pub use reader::{QueueMessage, QueueReader, ReadOutcome};

/// Destination for encoded update records.
///
/// `MessageQueue` is the production sink.
pub trait RecordSink: Send + Sync {
    /// Append one record, returning the timestamp it was assigned.
    fn append(&self, record: &[u8]) -> MqResult<i64>;
}
