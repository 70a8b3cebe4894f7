//! Delegating update logger
//!
//! A sharded store attaches one `ForwardingLogger` per shard, all wrapping the
//! same shared logger, so every shard's mutations land in one log. Each shard's
//! own call order is kept; ordering across shards is whatever the shared
//! logger serializes.
//!
//! A store-level clear clears every shard. Only the first shard should report
//! it, so the other shards use `secondary_shard`, which drops CLEAR.

use std::fmt;
use std::sync::Arc;

use super::errors::UlogResult;
use super::logger::UpdateLogger;

/// Update logger that forwards calls to another logger.
pub struct ForwardingLogger {
    inner: Arc<dyn UpdateLogger>,
    forward_clear: bool,
}

impl ForwardingLogger {
    /// Forward every call to `inner` unchanged
    pub fn new(inner: Arc<dyn UpdateLogger>) -> Self {
        Self {
            inner,
            forward_clear: true,
        }
    }

    /// Forward SET and REMOVE to `inner`; accept CLEAR without forwarding it
    pub fn secondary_shard(inner: Arc<dyn UpdateLogger>) -> Self {
        Self {
            inner,
            forward_clear: false,
        }
    }

    /// The wrapped logger
    pub fn inner(&self) -> &Arc<dyn UpdateLogger> {
        &self.inner
    }
}

impl fmt::Debug for ForwardingLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingLogger")
            .field("forward_clear", &self.forward_clear)
            .finish_non_exhaustive()
    }
}

impl UpdateLogger for ForwardingLogger {
    fn write_set(&self, key: &[u8], value: &[u8]) -> UlogResult<()> {
        self.inner.write_set(key, value)
    }

    fn write_remove(&self, key: &[u8]) -> UlogResult<()> {
        self.inner.write_remove(key)
    }

    fn write_clear(&self) -> UlogResult<()> {
        if self.forward_clear {
            self.inner.write_clear()
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ulog::BufferLogger;

    #[test]
    fn test_forwards_unchanged() {
        let core = Arc::new(BufferLogger::new(" "));
        let ulog = ForwardingLogger::new(core.clone());
        ulog.write_set(b"one", b"hop").unwrap();
        ulog.write_remove(b"two").unwrap();
        ulog.write_clear().unwrap();
        assert_eq!(core.snapshot(), vec!["SET one hop", "REMOVE two", "CLEAR"]);
    }

    #[test]
    fn test_secondary_shard_drops_clear() {
        let core = Arc::new(BufferLogger::new(" "));
        let ulog = ForwardingLogger::secondary_shard(core.clone());
        ulog.write_set(b"one", b"hop").unwrap();
        ulog.write_remove(b"two").unwrap();
        ulog.write_clear().unwrap();
        ulog.write_set(b"two", b"step").unwrap();
        assert_eq!(core.len(), 3);
        assert_eq!(core.pop_front().as_deref(), Some("SET one hop"));
        assert_eq!(core.pop_front().as_deref(), Some("REMOVE two"));
        assert_eq!(core.pop_front().as_deref(), Some("SET two step"));
    }

    #[test]
    fn test_shards_interleave_into_one_log() {
        let core = Arc::new(BufferLogger::new(" "));
        let first = ForwardingLogger::new(core.clone());
        let second = ForwardingLogger::secondary_shard(core.clone());
        first.write_set(b"a", b"1").unwrap();
        second.write_set(b"b", b"2").unwrap();
        first.write_clear().unwrap();
        second.write_clear().unwrap();
        assert_eq!(core.snapshot(), vec!["SET a 1", "SET b 2", "CLEAR"]);
    }
}
