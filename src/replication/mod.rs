//! Replication subsystem
//!
//! A follower tails the update queue and replays records onto a store it
//! owns. Followers are independent: each has its own cursor, filter and
//! target, and none of them can affect the writer.
//!
//! # Guarantees
//!
//! - Records are applied in queue order
//! - Filtered records never touch the target and are never judged corrupt
//! - A damaged record never mutates the target
//! - A follower stops only on queue close or on an error

mod config;
mod errors;
mod follower;

pub use config::{CorruptionPolicy, ReplicationConfig};
pub use errors::{ReplicationError, ReplicationResult};
pub use follower::{FollowerStats, ReplicaFollower, StepOutcome};
