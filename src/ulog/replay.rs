//! Replaying update records onto a store
//!
//! `apply_record` is the one primitive every consumer uses, whether it mirrors
//! in-process or tails a persisted queue. Steps, in order:
//!
//! 1. Scan the header. Failure is corruption.
//! 2. Compare the ids against the filter. A mismatch is `NotApplicable` and
//!    nothing else about the record is looked at, not even the opcode.
//! 3. Validate the opcode and decode the body. Failure is corruption.
//! 4. Apply the mutation. Only a fully decoded record touches the store.
//!
//! Removing an absent key succeeds during replay. A log can legitimately
//! carry a REMOVE for a key the replica never saw (it was cleared, or the
//! replica started mid-stream), and replay must converge instead of stopping.

use tracing::trace;

use super::errors::UlogResult;
use super::record::{decode_body, scan_header, Mutation, OpCode};
use crate::store::{KvStore, StoreError};

/// Selects which writers' records a consumer applies.
///
/// `None` matches any id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Required server id
    pub server_id: Option<u64>,
    /// Required shard index
    pub shard_index: Option<u64>,
}

impl RecordFilter {
    /// Filter that accepts every record
    pub fn any() -> Self {
        Self::default()
    }

    /// Filter on both ids
    pub fn exact(server_id: u64, shard_index: u64) -> Self {
        Self {
            server_id: Some(server_id),
            shard_index: Some(shard_index),
        }
    }

    /// Filter from optional ids
    pub fn new(server_id: Option<u64>, shard_index: Option<u64>) -> Self {
        Self {
            server_id,
            shard_index,
        }
    }

    /// Returns true if a record with these ids passes the filter
    pub fn matches(&self, server_id: u64, shard_index: u64) -> bool {
        self.server_id.map_or(true, |id| id == server_id)
            && self.shard_index.map_or(true, |index| index == shard_index)
    }
}

/// Result of a replay attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record was decoded and applied
    Applied(OpCode),
    /// The record belongs to another writer or shard and was skipped
    NotApplicable { server_id: u64, shard_index: u64 },
}

impl ApplyOutcome {
    /// Returns true if the store was mutated
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Decode `record`, filter it, and apply it to `store`.
///
/// # Errors
///
/// - `KV_ULOG_CORRUPTION` for malformed bytes (after the filter passed)
/// - `KV_ULOG_STORE_FAILED` for store failures other than removing an absent key
pub fn apply_record<S>(store: &S, record: &[u8], filter: &RecordFilter) -> UlogResult<ApplyOutcome>
where
    S: KvStore + ?Sized,
{
    let header = scan_header(record)?;

    if !filter.matches(header.server_id, header.shard_index) {
        trace!(
            server_id = header.server_id,
            shard_index = header.shard_index,
            "record filtered out"
        );
        return Ok(ApplyOutcome::NotApplicable {
            server_id: header.server_id,
            shard_index: header.shard_index,
        });
    }

    let op = header.op()?;
    let mutation = decode_body(op, &record[header.header_len..])?;
    apply_mutation(store, &mutation)?;

    Ok(ApplyOutcome::Applied(op))
}

/// Apply one mutation to `store` with replay semantics.
pub fn apply_mutation<S>(store: &S, mutation: &Mutation<'_>) -> UlogResult<()>
where
    S: KvStore + ?Sized,
{
    match *mutation {
        Mutation::Set { key, value } => store.set(key, value)?,
        Mutation::Remove { key } => remove_idempotent(store, key)?,
        Mutation::Clear => store.clear()?,
    }
    Ok(())
}

/// Remove `key`, treating an absent key as success.
pub fn remove_idempotent<S>(store: &S, key: &[u8]) -> Result<(), StoreError>
where
    S: KvStore + ?Sized,
{
    match store.remove(key) {
        Ok(()) | Err(StoreError::NotFound) => Ok(()),
        Err(e) => Err(e),
    }
}
