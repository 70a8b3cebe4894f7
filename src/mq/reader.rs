//! Tailing reader
//!
//! Every reader owns its cursor (segment id + byte offset) and its own file
//! handle. Reading never consumes anything: any number of readers see every
//! record, in append order.
//!
//! `read` blocks on the queue's condvar until a frame is published, the
//! timeout expires (`NoData`), or the queue is closed and the cursor has
//! reached its end (`Canceled`).

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use super::errors::{MqError, MqResult};
use super::frame::{read_frame, FrameRead};
use super::queue::{MessageQueue, Position};

/// A record read back from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Timestamp assigned at append time
    pub timestamp: i64,
    /// Record bytes as appended
    pub data: Vec<u8>,
}

/// Result of a `read` that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The next record
    Message(QueueMessage),
    /// Nothing new before the timeout; try again
    NoData,
    /// The queue was closed and everything before the close has been read
    Canceled,
}

/// Independent cursor over a `MessageQueue`
#[derive(Debug)]
pub struct QueueReader {
    queue: Arc<MessageQueue>,
    min_timestamp: i64,
    segment_id: u64,
    offset: u64,
    file: Option<File>,
}

impl QueueReader {
    pub(crate) fn new(queue: Arc<MessageQueue>, min_timestamp: i64, segment_id: u64) -> Self {
        Self {
            queue,
            min_timestamp,
            segment_id,
            offset: 0,
            file: None,
        }
    }

    /// Lowest timestamp this reader returns
    pub fn min_timestamp(&self) -> i64 {
        self.min_timestamp
    }

    /// Current cursor as (segment id, byte offset)
    pub fn position(&self) -> (u64, u64) {
        (self.segment_id, self.offset)
    }

    /// Read the next record, waiting up to `timeout` for one to arrive.
    ///
    /// A zero timeout polls without blocking. A timeout too large to add to
    /// the current instant, such as `Duration::MAX`, waits without limit.
    ///
    /// # Errors
    ///
    /// - `KV_MQ_IO_ERROR` if a segment cannot be opened or read
    /// - `KV_MQ_CORRUPTION` if a published frame fails verification
    pub fn read(&mut self, timeout: Duration) -> MqResult<ReadOutcome> {
        let deadline = Instant::now().checked_add(timeout);
        let queue = Arc::clone(&self.queue);

        loop {
            {
                let mut state = queue.lock_state();
                loop {
                    match state.position(self.segment_id, self.offset) {
                        Position::Ready => break,
                        Position::NextSegment(id) => {
                            self.segment_id = id;
                            self.offset = 0;
                            self.file = None;
                        }
                        Position::Exhausted => {
                            if state.closed {
                                return Ok(ReadOutcome::Canceled);
                            }
                            state = match deadline {
                                Some(deadline) => {
                                    let now = Instant::now();
                                    if now >= deadline {
                                        return Ok(ReadOutcome::NoData);
                                    }
                                    queue
                                        .appended
                                        .wait_timeout(state, deadline - now)
                                        .unwrap_or_else(PoisonError::into_inner)
                                        .0
                                }
                                None => queue
                                    .appended
                                    .wait(state)
                                    .unwrap_or_else(PoisonError::into_inner),
                            };
                        }
                    }
                }
            }

            let (timestamp, data) = self.read_frame()?;
            if timestamp < self.min_timestamp {
                continue;
            }
            trace!(segment = self.segment_id, offset = self.offset, timestamp, "frame read");
            return Ok(ReadOutcome::Message(QueueMessage { timestamp, data }));
        }
    }

    /// Read the frame at the cursor; the caller has checked it is published.
    fn read_frame(&mut self) -> MqResult<(i64, Vec<u8>)> {
        let path = self.queue.segment_path(self.segment_id);
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => {
                let mut file = File::open(&path).map_err(|e| {
                    MqError::io(format!("failed to open segment {}", path.display()), e)
                })?;
                file.seek(SeekFrom::Start(self.offset)).map_err(|e| {
                    MqError::io(format!("failed to seek segment {}", path.display()), e)
                })?;
                self.file.insert(file)
            }
        };

        let read = match read_frame(file) {
            Ok(read) => read,
            Err(e) => {
                // The handle may have stopped mid-frame; reopen at the cursor next time.
                self.file = None;
                return Err(MqError::io(
                    format!("failed to read segment {}", path.display()),
                    e,
                ));
            }
        };
        match read {
            Ok(FrameRead::Frame(frame)) => {
                self.offset += frame.encoded_len();
                Ok((frame.timestamp, frame.payload))
            }
            Ok(FrameRead::End) => Err(MqError::corruption(
                path,
                self.offset,
                "segment shorter than its published size",
            )),
            Err(reason) => {
                self.file = None;
                Err(MqError::corruption(path, self.offset, reason))
            }
        }
    }
}
