//! Key-value store contract and in-memory engines
//!
//! The update log and replay code only ever see a store through `KvStore`.
//! `MemoryStore` is an ordered map; `ShardedStore` spreads keys over several
//! `MemoryStore` shards.
//!
//! A store calls its attached logger after a mutation has been applied. With
//! no logger attached, nothing is encoded or forwarded.

mod errors;
mod memory;
mod sharded;

use std::sync::Arc;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sharded::ShardedStore;

use crate::ulog::UpdateLogger;

/// A key-value store that reports its mutations to an update logger.
pub trait KvStore: Send + Sync {
    /// Set `key` to `value`, overwriting any previous value.
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the key is absent.
    fn remove(&self, key: &[u8]) -> StoreResult<()>;

    /// Remove every key.
    fn clear(&self) -> StoreResult<()>;

    /// Look up `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the key is absent.
    fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Append `value` to the current value of `key`, separated by
    /// `delimiter`; sets `key` to `value` if it is absent.
    ///
    /// Logged as a SET of the resulting value.
    fn append(&self, key: &[u8], value: &[u8], delimiter: &[u8]) -> StoreResult<()>;

    /// Number of keys.
    fn count(&self) -> usize;

    /// All entries in key order.
    fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)>;

    /// Attach `logger`, replacing any logger attached before.
    fn attach_logger(&self, logger: Arc<dyn UpdateLogger>);

    /// Detach the current logger, returning it.
    fn detach_logger(&self) -> Option<Arc<dyn UpdateLogger>>;

    /// Returns true if `key` is present.
    fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_ok()
    }
}
