//! Store partitioned over several in-memory shards
//!
//! Keys are routed by CRC32 of the key, so placement is stable across
//! processes. Two ways to log:
//!
//! - `attach_logger`: one shared logger. Shard 0 forwards everything to it;
//!   the other shards forward SET and REMOVE but not CLEAR, so a store-level
//!   clear is logged once.
//! - `attach_shard_loggers`: one logger per shard, typically a `QueueLogger`
//!   stamped with the shard index so consumers can filter per shard.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::errors::StoreResult;
use super::memory::MemoryStore;
use super::KvStore;
use crate::ulog::{ForwardingLogger, UpdateLogger};

/// Key-value store split across `MemoryStore` shards
pub struct ShardedStore {
    shards: Vec<MemoryStore>,
    shared_logger: RwLock<Option<Arc<dyn UpdateLogger>>>,
}

impl ShardedStore {
    /// Create a store with `num_shards` shards (at least one)
    pub fn new(num_shards: usize) -> Self {
        let shards = (0..num_shards.max(1)).map(|_| MemoryStore::new()).collect();
        Self {
            shards,
            shared_logger: RwLock::new(None),
        }
    }

    /// Number of shards
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard holding `key`
    pub fn shard_index(&self, key: &[u8]) -> usize {
        crc32fast::hash(key) as usize % self.shards.len()
    }

    /// Borrow one shard
    pub fn shard(&self, index: usize) -> Option<&MemoryStore> {
        self.shards.get(index)
    }

    /// Attach a separate logger to every shard; `make` receives the shard index
    pub fn attach_shard_loggers<F>(&self, mut make: F)
    where
        F: FnMut(usize) -> Arc<dyn UpdateLogger>,
    {
        self.set_shared(None);
        for (index, shard) in self.shards.iter().enumerate() {
            shard.attach_logger(make(index));
        }
    }

    fn route(&self, key: &[u8]) -> &MemoryStore {
        &self.shards[self.shard_index(key)]
    }

    fn set_shared(&self, logger: Option<Arc<dyn UpdateLogger>>) -> Option<Arc<dyn UpdateLogger>> {
        let mut slot = self
            .shared_logger
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, logger)
    }
}

impl fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedStore")
            .field("shards", &self.shards)
            .finish_non_exhaustive()
    }
}

impl KvStore for ShardedStore {
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.route(key).set(key, value)
    }

    fn remove(&self, key: &[u8]) -> StoreResult<()> {
        self.route(key).remove(key)
    }

    fn clear(&self) -> StoreResult<()> {
        // Every shard is cleared even if a logger fails; the first failure wins.
        let mut first_err = None;
        for shard in &self.shards {
            if let Err(e) = shard.clear() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.route(key).get(key)
    }

    fn append(&self, key: &[u8], value: &[u8], delimiter: &[u8]) -> StoreResult<()> {
        self.route(key).append(key, value, delimiter)
    }

    fn count(&self) -> usize {
        self.shards.iter().map(MemoryStore::count).sum()
    }

    fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut entries: Vec<_> = self.shards.iter().flat_map(MemoryStore::entries).collect();
        entries.sort();
        entries
    }

    fn attach_logger(&self, logger: Arc<dyn UpdateLogger>) {
        for (index, shard) in self.shards.iter().enumerate() {
            let forwarding = if index == 0 {
                ForwardingLogger::new(Arc::clone(&logger))
            } else {
                ForwardingLogger::secondary_shard(Arc::clone(&logger))
            };
            shard.attach_logger(Arc::new(forwarding));
        }
        self.set_shared(Some(logger));
    }

    fn detach_logger(&self) -> Option<Arc<dyn UpdateLogger>> {
        for shard in &self.shards {
            shard.detach_logger();
        }
        self.set_shared(None)
    }
}
