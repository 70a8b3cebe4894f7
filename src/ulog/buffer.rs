//! In-memory textual update log
//!
//! Keeps one line per mutation (`SET k v`, `REMOVE k`, `CLEAR`) in insertion
//! order. Both ends can be drained, which makes it handy for inspecting what a
//! store reported and for hand-feeding another system.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::errors::UlogResult;
use super::logger::UpdateLogger;

/// Update logger that buffers formatted lines in a deque.
#[derive(Debug)]
pub struct BufferLogger {
    /// Placed between the tokens of a line
    separator: String,
    entries: Mutex<VecDeque<String>>,
}

impl BufferLogger {
    /// Create an empty buffer joining tokens with `separator`
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of buffered lines
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns true if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop every buffered line
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Take the oldest line, or None if the buffer is empty
    pub fn pop_front(&self) -> Option<String> {
        self.entries().pop_front()
    }

    /// Take the newest line, or None if the buffer is empty
    pub fn pop_back(&self) -> Option<String> {
        self.entries().pop_back()
    }

    /// Copy of the buffered lines, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.entries().iter().cloned().collect()
    }

    // The deque holds plain strings, so a panic elsewhere cannot leave it
    // half-updated.
    fn entries(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, line: String) {
        self.entries().push_back(line);
    }
}

impl UpdateLogger for BufferLogger {
    fn write_set(&self, key: &[u8], value: &[u8]) -> UlogResult<()> {
        let line = format!(
            "SET{sep}{}{sep}{}",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(value),
            sep = self.separator
        );
        self.push(line);
        Ok(())
    }

    fn write_remove(&self, key: &[u8]) -> UlogResult<()> {
        let line = format!(
            "REMOVE{}{}",
            self.separator,
            String::from_utf8_lossy(key)
        );
        self.push(line);
        Ok(())
    }

    fn write_clear(&self) -> UlogResult<()> {
        self.push("CLEAR".to_string());
        Ok(())
    }
}
