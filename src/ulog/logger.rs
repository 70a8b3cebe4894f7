//! The update logger capability
//!
//! A store with an attached logger calls one of the `write_*` methods after
//! each successful mutation. The calls are notifications: the store has
//! already changed by the time the logger runs, and a logger error reports a
//! failure of the log itself, never a rejected mutation.

use super::errors::UlogResult;
use super::record::Mutation;

/// Receiver of store mutation notifications.
pub trait UpdateLogger: Send + Sync {
    /// A key was set to a value.
    fn write_set(&self, key: &[u8], value: &[u8]) -> UlogResult<()>;

    /// A key was removed.
    fn write_remove(&self, key: &[u8]) -> UlogResult<()>;

    /// Every key was removed.
    fn write_clear(&self) -> UlogResult<()>;

    /// Dispatch a mutation to the matching `write_*` call.
    fn write_mutation(&self, mutation: &Mutation<'_>) -> UlogResult<()> {
        match *mutation {
            Mutation::Set { key, value } => self.write_set(key, value),
            Mutation::Remove { key } => self.write_remove(key),
            Mutation::Clear => self.write_clear(),
        }
    }
}
