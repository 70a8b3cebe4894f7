//! kvreplica - update logging and deterministic replay for an embedded
//! key-value store
//!
//! A primary store reports every mutation to an update logger. The logger
//! encodes it as a compact binary record and appends it to a persisted,
//! timestamp-ordered queue. Replicas tail that queue and replay the records
//! onto their own stores until they converge on the primary's state.
//!
//! # Subsystems
//!
//! - `store`: the store contract and in-memory engines
//! - `ulog`: record codec, update loggers and replay
//! - `mq`: the file-backed multi-reader queue
//! - `replication`: followers that tail the queue into a replica store

pub mod mq;
pub mod replication;
pub mod store;
pub mod ulog;
