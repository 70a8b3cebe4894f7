//! Update logger feeding a persisted queue
//!
//! Each notification becomes exactly one encoded record and one queue append.
//! The queue serializes concurrent appends, so the logger holds no lock.

use std::sync::Arc;

use tracing::trace;

use super::errors::UlogResult;
use super::logger::UpdateLogger;
use super::record::{encode_record, Mutation};
use crate::mq::{MessageQueue, RecordSink};

/// Update logger that appends encoded records to a queue.
pub struct QueueLogger<Q: RecordSink + ?Sized = MessageQueue> {
    sink: Arc<Q>,
    server_id: u64,
    shard_index: u64,
}

impl<Q: RecordSink + ?Sized> QueueLogger<Q> {
    /// Tag records with `server_id` and `shard_index` and append them to `sink`
    pub fn new(sink: Arc<Q>, server_id: u64, shard_index: u64) -> Self {
        Self {
            sink,
            server_id,
            shard_index,
        }
    }

    /// Server id stamped on every record
    pub fn server_id(&self) -> u64 {
        self.server_id
    }

    /// Shard index stamped on every record
    pub fn shard_index(&self) -> u64 {
        self.shard_index
    }

    fn append(&self, mutation: Mutation<'_>) -> UlogResult<()> {
        let record = encode_record(&mutation, self.server_id, self.shard_index);
        let timestamp = self.sink.append(&record)?;
        trace!(op = %mutation.op(), timestamp, len = record.len(), "update record appended");
        Ok(())
    }
}

impl<Q: RecordSink + ?Sized> UpdateLogger for QueueLogger<Q> {
    fn write_set(&self, key: &[u8], value: &[u8]) -> UlogResult<()> {
        self.append(Mutation::Set { key, value })
    }

    fn write_remove(&self, key: &[u8]) -> UlogResult<()> {
        self.append(Mutation::Remove { key })
    }

    fn write_clear(&self) -> UlogResult<()> {
        self.append(Mutation::Clear)
    }
}
