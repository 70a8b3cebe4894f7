//! Append side of the message queue
//!
//! - One writer handle, guarded by the queue mutex; appends are serialized
//! - Each append writes one whole frame, then publishes the new segment size
//! - A failed write is rolled back to the last published size
//! - Timestamps never decrease, even if the wall clock does
//!
//! Readers never look past a published size, so they cannot observe half a
//! frame.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, error, info};

use super::config::{OpenMode, QueueConfig};
use super::errors::{MqError, MqResult};
use super::frame::{encode_frame, read_frame, FrameRead};
use super::reader::QueueReader;
use super::RecordSink;

const SEGMENT_DIGITS: usize = 10;

/// A segment file and the number of bytes readers may consume from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub id: u64,
    pub size: u64,
}

/// Where a reader's next frame is, as seen under the queue lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    /// A complete frame starts at the reader's offset in this segment
    Ready,
    /// The reader's segment is exhausted; continue at the start of this one
    NextSegment(u64),
    /// Nothing beyond the reader's offset has been published yet
    Exhausted,
}

#[derive(Debug)]
pub(crate) struct QueueState {
    /// Active segment handle; None once closed
    writer: Option<File>,
    /// Segments in id order; the last one is active
    pub segments: Vec<Segment>,
    last_timestamp: i64,
    pub closed: bool,
}

impl QueueState {
    pub fn position(&self, segment_id: u64, offset: u64) -> Position {
        match self.segments.iter().position(|s| s.id == segment_id) {
            Some(i) if offset < self.segments[i].size => Position::Ready,
            Some(i) => match self.segments.get(i + 1) {
                Some(next) => Position::NextSegment(next.id),
                None => Position::Exhausted,
            },
            None => match self.segments.iter().find(|s| s.id > segment_id) {
                Some(next) => Position::NextSegment(next.id),
                None => Position::Exhausted,
            },
        }
    }

    pub fn first_segment_id(&self) -> u64 {
        self.segments.first().map_or(0, |s| s.id)
    }
}

/// File-backed, timestamp-ordered append-only queue with tailing readers.
#[derive(Debug)]
pub struct MessageQueue {
    path_prefix: PathBuf,
    max_file_size: u64,
    sync: bool,
    pub(crate) state: Mutex<QueueState>,
    pub(crate) appended: Condvar,
}

impl MessageQueue {
    /// Open a queue whose segments are named `<path_prefix>.<index>`.
    ///
    /// # Errors
    ///
    /// - `KV_MQ_INVALID_CONFIG` for an unusable prefix or zero file size
    /// - `KV_MQ_CORRUPTION` if an existing segment holds a damaged frame
    /// - `KV_MQ_IO_ERROR` if segments cannot be listed, removed or created
    pub fn open(
        path_prefix: impl Into<PathBuf>,
        max_file_size: u64,
        mode: OpenMode,
    ) -> MqResult<Arc<Self>> {
        let config = QueueConfig::new(path_prefix)
            .with_max_file_size(max_file_size)
            .with_mode(mode);
        Self::open_with_config(&config)
    }

    /// Open a queue from a configuration.
    pub fn open_with_config(config: &QueueConfig) -> MqResult<Arc<Self>> {
        config.validate()?;
        let prefix = config.path_prefix.clone();

        let mut ids = list_segment_ids(&prefix)?;
        if config.mode == OpenMode::Truncate {
            for id in ids.drain(..) {
                let path = segment_path(&prefix, id);
                fs::remove_file(&path).map_err(|e| {
                    MqError::io(format!("failed to remove segment {}", path.display()), e)
                })?;
            }
        }

        let mut segments = Vec::with_capacity(ids.len().max(1));
        let mut last_timestamp = i64::MIN;
        for id in ids {
            let (size, last) = scan_segment(&segment_path(&prefix, id))?;
            if let Some(ts) = last {
                last_timestamp = last_timestamp.max(ts);
            }
            segments.push(Segment { id, size });
        }
        if segments.is_empty() {
            segments.push(Segment { id: 0, size: 0 });
        }

        let active = segments[segments.len() - 1];
        let writer = open_segment_for_append(&segment_path(&prefix, active.id))?;

        info!(
            path_prefix = %prefix.display(),
            segments = segments.len(),
            active_segment = active.id,
            "message queue opened"
        );

        Ok(Arc::new(Self {
            path_prefix: prefix,
            max_file_size: config.max_file_size,
            sync: config.sync,
            state: Mutex::new(QueueState {
                writer: Some(writer),
                segments,
                last_timestamp,
                closed: false,
            }),
            appended: Condvar::new(),
        }))
    }

    /// Prefix the segment files are named after
    pub fn path_prefix(&self) -> &Path {
        &self.path_prefix
    }

    /// Path of the segment with `id`
    pub fn segment_path(&self, id: u64) -> PathBuf {
        segment_path(&self.path_prefix, id)
    }

    /// Ids of the segments currently in use, oldest first
    pub fn segment_ids(&self) -> Vec<u64> {
        self.lock_state().segments.iter().map(|s| s.id).collect()
    }

    /// Returns true once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Append one record and return its timestamp (ms since the Unix epoch).
    ///
    /// # Errors
    ///
    /// - `KV_MQ_CLOSED` after `close`
    /// - `KV_MQ_RECORD_TOO_LARGE` for payloads over 4 GiB
    /// - `KV_MQ_IO_ERROR` if the frame cannot be written; nothing is published
    pub fn append(&self, data: &[u8]) -> MqResult<i64> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(MqError::Closed);
        }

        let timestamp = Utc::now().timestamp_millis().max(state.last_timestamp);
        let frame = encode_frame(timestamp, data)?;

        if state.segments.last().map_or(false, |s| s.size >= self.max_file_size) {
            self.rotate(&mut state)?;
        }

        let active_index = state.segments.len() - 1;
        let published = state.segments[active_index].size;
        let sync = self.sync;
        let writer = state.writer.as_mut().ok_or(MqError::Closed)?;

        if let Err(e) = write_frame(writer, &frame, sync) {
            // Drop whatever part of the frame reached the file.
            let rollback = writer.set_len(published);
            let err = self.fail_append(&mut state, published, e, rollback);
            drop(state);
            self.appended.notify_all();
            return Err(err);
        }

        state.segments[active_index].size = published + frame.len() as u64;
        state.last_timestamp = timestamp;
        drop(state);
        self.appended.notify_all();

        Ok(timestamp)
    }

    /// Create a reader positioned at the first record with a timestamp of at
    /// least `min_timestamp`.
    pub fn make_reader(self: &Arc<Self>, min_timestamp: i64) -> QueueReader {
        let first = self.lock_state().first_segment_id();
        QueueReader::new(Arc::clone(self), min_timestamp, first)
    }

    /// Close the queue.
    ///
    /// Later appends fail with `KV_MQ_CLOSED`. Every blocked reader wakes up;
    /// readers drain what was appended before the close and then report
    /// `ReadOutcome::Canceled`. Closing twice is a no-op.
    pub fn close(&self) -> MqResult<()> {
        let mut state = self.lock_state();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        let writer = state.writer.take();
        drop(state);
        self.appended.notify_all();

        if let Some(file) = writer {
            file.sync_all()
                .map_err(|e| MqError::io("failed to sync segment on close", e))?;
        }
        info!(path_prefix = %self.path_prefix.display(), "message queue closed");
        Ok(())
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Turn a failed frame write into an error.
    ///
    /// If the partial frame could not be truncated away, the file no longer
    /// matches the published size; the queue is closed so nothing is appended
    /// after the torn bytes. Readers still drain what was published.
    fn fail_append(
        &self,
        state: &mut QueueState,
        published: u64,
        write_err: io::Error,
        rollback: io::Result<()>,
    ) -> MqError {
        let Err(rollback_err) = rollback else {
            return MqError::io("failed to append frame", write_err);
        };

        state.writer = None;
        state.closed = true;
        error!(
            path_prefix = %self.path_prefix.display(),
            published,
            write_error = %write_err,
            rollback_error = %rollback_err,
            "partial frame could not be rolled back, message queue closed"
        );
        MqError::io(
            format!(
                "failed to append frame; rollback to {} bytes also failed ({}), queue closed",
                published, rollback_err
            ),
            write_err,
        )
    }

    fn rotate(&self, state: &mut QueueState) -> MqResult<()> {
        let next_id = state.segments.last().map_or(0, |s| s.id + 1);
        let path = segment_path(&self.path_prefix, next_id);
        let file = open_segment_for_append(&path)?;
        if let Some(old) = state.writer.replace(file) {
            old.sync_all()
                .map_err(|e| MqError::io("failed to sync finished segment", e))?;
        }
        state.segments.push(Segment { id: next_id, size: 0 });
        debug!(segment = next_id, "message queue segment started");
        Ok(())
    }
}

impl RecordSink for MessageQueue {
    fn append(&self, record: &[u8]) -> MqResult<i64> {
        MessageQueue::append(self, record)
    }
}

fn write_frame(file: &mut File, frame: &[u8], sync: bool) -> io::Result<()> {
    file.write_all(frame)?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

/// `<prefix>.<id padded to 10 digits>`
pub(crate) fn segment_path(prefix: &Path, id: u64) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(format!(".{:0width$}", id, width = SEGMENT_DIGITS));
    PathBuf::from(name)
}

fn list_segment_ids(prefix: &Path) -> MqResult<Vec<u64>> {
    let dir = match prefix.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let base = prefix
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MqError::InvalidConfig("path_prefix must be valid UTF-8".to_string()))?;

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(&dir).map_err(|e| {
                MqError::io(format!("failed to create directory {}", dir.display()), e)
            })?;
            return Ok(Vec::new());
        }
        Err(e) => return Err(MqError::io(format!("failed to list {}", dir.display()), e)),
    };

    let mut ids = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| MqError::io(format!("failed to list {}", dir.display()), e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(suffix) = name.strip_prefix(base).and_then(|s| s.strip_prefix('.')) else {
            continue;
        };
        if suffix.len() == SEGMENT_DIGITS && suffix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = suffix.parse::<u64>() {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Verify every frame of a segment; returns its size and last timestamp.
fn scan_segment(path: &Path) -> MqResult<(u64, Option<i64>)> {
    let file = File::open(path)
        .map_err(|e| MqError::io(format!("failed to open segment {}", path.display()), e))?;
    let mut reader = io::BufReader::new(file);
    let mut offset = 0u64;
    let mut last = None;

    loop {
        let read = read_frame(&mut reader)
            .map_err(|e| MqError::io(format!("failed to read segment {}", path.display()), e))?;
        match read {
            Ok(FrameRead::Frame(frame)) => {
                offset += frame.encoded_len();
                last = Some(frame.timestamp);
            }
            Ok(FrameRead::End) => break,
            Err(reason) => return Err(MqError::corruption(path, offset, reason)),
        }
    }

    Ok((offset, last))
}

fn open_segment_for_append(path: &Path) -> MqResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| MqError::io(format!("failed to open segment {}", path.display()), e))
}
