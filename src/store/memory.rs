//! Ordered in-memory store
//!
//! The attached logger is notified while the write lock is still held, so the
//! order of entries in the update log is the order mutations were applied.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::errors::{StoreError, StoreResult};
use super::KvStore;
use crate::ulog::UpdateLogger;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory ordered key-value store
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<Map>,
    logger: RwLock<Option<Arc<dyn UpdateLogger>>>,
}

impl MemoryStore {
    /// Create an empty store with no logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a logger is attached
    pub fn has_logger(&self) -> bool {
        self.logger_slot().is_some()
    }

    fn read_map(&self) -> RwLockReadGuard<'_, Map> {
        self.map.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, Map> {
        self.map.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn logger_slot(&self) -> Option<Arc<dyn UpdateLogger>> {
        self.logger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("count", &self.count())
            .field("has_logger", &self.has_logger())
            .finish()
    }
}

impl KvStore for MemoryStore {
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let logger = self.logger_slot();
        let mut map = self.write_map();
        map.insert(key.to_vec(), value.to_vec());
        if let Some(logger) = logger {
            logger.write_set(key, value)?;
        }
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> StoreResult<()> {
        let logger = self.logger_slot();
        let mut map = self.write_map();
        if map.remove(key).is_none() {
            return Err(StoreError::NotFound);
        }
        if let Some(logger) = logger {
            logger.write_remove(key)?;
        }
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let logger = self.logger_slot();
        let mut map = self.write_map();
        map.clear();
        if let Some(logger) = logger {
            logger.write_clear()?;
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.read_map().get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn append(&self, key: &[u8], value: &[u8], delimiter: &[u8]) -> StoreResult<()> {
        let logger = self.logger_slot();
        let mut map = self.write_map();
        let new_value = match map.get_mut(key) {
            Some(current) => {
                current.extend_from_slice(delimiter);
                current.extend_from_slice(value);
                current.clone()
            }
            None => {
                map.insert(key.to_vec(), value.to_vec());
                value.to_vec()
            }
        };
        if let Some(logger) = logger {
            logger.write_set(key, &new_value)?;
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.read_map().len()
    }

    fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.read_map()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn attach_logger(&self, logger: Arc<dyn UpdateLogger>) {
        *self.logger.write().unwrap_or_else(PoisonError::into_inner) = Some(logger);
    }

    fn detach_logger(&self) -> Option<Arc<dyn UpdateLogger>> {
        self.logger
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
