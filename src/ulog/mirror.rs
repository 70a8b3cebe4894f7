//! Synchronous in-process mirroring
//!
//! Applies each notification straight to a second store, without encoding
//! anything. Shares the replay policy of `apply_record`: removing a key the
//! mirror does not hold succeeds.

use std::sync::Arc;

use super::errors::UlogResult;
use super::logger::UpdateLogger;
use super::replay::remove_idempotent;
use crate::store::KvStore;

/// Update logger that mirrors mutations onto another store.
pub struct MirrorLogger<S: KvStore + ?Sized> {
    target: Arc<S>,
}

impl<S: KvStore + ?Sized> MirrorLogger<S> {
    /// Mirror onto `target`
    pub fn new(target: Arc<S>) -> Self {
        Self { target }
    }

    /// The store receiving the mirrored mutations
    pub fn target(&self) -> &Arc<S> {
        &self.target
    }
}

impl<S: KvStore + ?Sized> UpdateLogger for MirrorLogger<S> {
    fn write_set(&self, key: &[u8], value: &[u8]) -> UlogResult<()> {
        self.target.set(key, value)?;
        Ok(())
    }

    fn write_remove(&self, key: &[u8]) -> UlogResult<()> {
        remove_idempotent(self.target.as_ref(), key)?;
        Ok(())
    }

    fn write_clear(&self) -> UlogResult<()> {
        self.target.clear()?;
        Ok(())
    }
}
