//! Replica follower
//!
//! Tails a message queue and replays every record onto a private target
//! store. One follower per reader thread; followers never share a cursor.
//!
//! The follower stops when the queue is closed and everything appended before
//! the close has been applied. A damaged record either halts the follower or
//! is skipped, depending on its `CorruptionPolicy`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::config::{CorruptionPolicy, ReplicationConfig};
use super::errors::{ReplicationError, ReplicationResult};
use crate::mq::{MessageQueue, QueueReader, ReadOutcome};
use crate::store::KvStore;
use crate::ulog::{apply_record, ApplyOutcome, OpCode, RecordFilter};

/// Result of a single `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A record was applied to the target
    Applied(OpCode),
    /// A record for another server or shard was passed over
    Skipped,
    /// A damaged record was passed over
    Corrupt,
    /// No record arrived before the timeout
    Idle,
    /// The queue is closed and fully consumed
    Canceled,
}

/// Counters kept by a follower
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowerStats {
    /// Records applied to the target
    pub applied: u64,
    /// Records passed over by the filter
    pub not_applicable: u64,
    /// Damaged records passed over under `CorruptionPolicy::Skip`
    pub corrupt_skipped: u64,
    /// Timestamp of the last record read, applied or not
    pub last_timestamp: Option<i64>,
}

/// Applies the records of a queue to a target store.
pub struct ReplicaFollower<S: KvStore + ?Sized> {
    id: Uuid,
    reader: QueueReader,
    target: Arc<S>,
    filter: RecordFilter,
    policy: CorruptionPolicy,
    stats: FollowerStats,
}

impl<S: KvStore + ?Sized> ReplicaFollower<S> {
    /// Follow `reader` onto `target` with a freshly generated id
    pub fn new(
        reader: QueueReader,
        target: Arc<S>,
        filter: RecordFilter,
        policy: CorruptionPolicy,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reader,
            target,
            filter,
            policy,
            stats: FollowerStats::default(),
        }
    }

    /// Create a follower reading `queue` from `config.start_timestamp`.
    ///
    /// # Errors
    ///
    /// `KV_REPL_INVALID_CONFIG` if the configuration does not validate.
    pub fn from_config(
        queue: &Arc<MessageQueue>,
        target: Arc<S>,
        config: &ReplicationConfig,
    ) -> ReplicationResult<Self> {
        config.validate()?;
        let reader = queue.make_reader(config.start_timestamp);
        Ok(Self {
            id: config.follower_id,
            reader,
            target,
            filter: config.filter(),
            policy: config.on_corruption,
            stats: FollowerStats::default(),
        })
    }

    /// Id tagging this follower's log output
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The store records are applied to
    pub fn target(&self) -> &Arc<S> {
        &self.target
    }

    /// Counters so far
    pub fn stats(&self) -> FollowerStats {
        self.stats
    }

    /// Read at most one record, waiting up to `timeout`, and apply it.
    ///
    /// # Errors
    ///
    /// - `KV_REPL_TRANSPORT_FAILED` if the queue cannot be read
    /// - `KV_REPL_APPLY_FAILED` if the target rejects a mutation, or a record
    ///   is damaged and the policy is `Halt`
    pub fn step(&mut self, timeout: Duration) -> ReplicationResult<StepOutcome> {
        let message = match self.reader.read(timeout)? {
            ReadOutcome::Message(message) => message,
            ReadOutcome::NoData => return Ok(StepOutcome::Idle),
            ReadOutcome::Canceled => return Ok(StepOutcome::Canceled),
        };
        self.stats.last_timestamp = Some(message.timestamp);

        match apply_record(&*self.target, &message.data, &self.filter) {
            Ok(ApplyOutcome::Applied(op)) => {
                self.stats.applied += 1;
                Ok(StepOutcome::Applied(op))
            }
            Ok(ApplyOutcome::NotApplicable { .. }) => {
                self.stats.not_applicable += 1;
                Ok(StepOutcome::Skipped)
            }
            Err(e) if e.is_corruption() && self.policy == CorruptionPolicy::Skip => {
                warn!(
                    follower = %self.id,
                    timestamp = message.timestamp,
                    error = %e,
                    "skipping corrupt update record"
                );
                self.stats.corrupt_skipped += 1;
                Ok(StepOutcome::Corrupt)
            }
            Err(e) => Err(ReplicationError::Apply(e)),
        }
    }

    /// Apply records until the queue is closed and drained.
    ///
    /// Returns the final counters. `poll_interval` bounds each wait, not the
    /// total run time.
    pub fn run(&mut self, poll_interval: Duration) -> ReplicationResult<FollowerStats> {
        let span = info_span!("follower", id = %self.id);
        let _enter = span.enter();
        info!("follower started");

        loop {
            match self.step(poll_interval) {
                Ok(StepOutcome::Canceled) => break,
                Ok(StepOutcome::Idle) => debug!("no update records yet"),
                Ok(_) => {}
                Err(e) => {
                    warn!(code = e.code(), error = %e, "follower halted");
                    return Err(e);
                }
            }
        }

        info!(
            applied = self.stats.applied,
            not_applicable = self.stats.not_applicable,
            corrupt_skipped = self.stats.corrupt_skipped,
            "follower stopped"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mq::OpenMode;
    use crate::store::MemoryStore;
    use crate::ulog::{encode_record, Mutation};
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Arc<MessageQueue> {
        MessageQueue::open(dir.path().join("ulog"), 1 << 20, OpenMode::Truncate).unwrap()
    }

    fn set(key: &[u8], value: &[u8], server_id: u64, shard_index: u64) -> Vec<u8> {
        encode_record(&Mutation::Set { key, value }, server_id, shard_index)
    }

    #[test]
    fn test_step_reports_each_outcome() {
        let dir = TempDir::new().unwrap();
        let mq = open(&dir);
        mq.append(&set(b"a", b"1", 1, 0)).unwrap();
        mq.append(&set(b"b", b"2", 2, 0)).unwrap();

        let target = Arc::new(MemoryStore::new());
        let mut follower = ReplicaFollower::new(
            mq.make_reader(0),
            Arc::clone(&target),
            RecordFilter::new(Some(1), None),
            CorruptionPolicy::Halt,
        );

        assert_eq!(
            follower.step(Duration::ZERO).unwrap(),
            StepOutcome::Applied(OpCode::Set)
        );
        assert_eq!(follower.step(Duration::ZERO).unwrap(), StepOutcome::Skipped);
        assert_eq!(follower.step(Duration::ZERO).unwrap(), StepOutcome::Idle);
        mq.close().unwrap();
        assert_eq!(follower.step(Duration::ZERO).unwrap(), StepOutcome::Canceled);

        assert_eq!(target.get(b"a").unwrap(), b"1");
        assert!(!target.contains(b"b"));
        let stats = follower.stats();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.not_applicable, 1);
        assert!(stats.last_timestamp.is_some());
    }

    #[test]
    fn test_halt_policy_stops_on_corruption() {
        let dir = TempDir::new().unwrap();
        let mq = open(&dir);
        mq.append(&[0xFF, 0x00, 0x00]).unwrap();
        mq.append(&set(b"after", b"x", 1, 0)).unwrap();
        mq.close().unwrap();

        let target = Arc::new(MemoryStore::new());
        let mut follower = ReplicaFollower::new(
            mq.make_reader(0),
            Arc::clone(&target),
            RecordFilter::any(),
            CorruptionPolicy::Halt,
        );
        let err = follower.run(Duration::from_millis(10)).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(target.count(), 0);
    }

    #[test]
    fn test_skip_policy_continues_past_corruption() {
        let dir = TempDir::new().unwrap();
        let mq = open(&dir);
        mq.append(&[0xA1, 0x00, 0x00, 0x0F]).unwrap();
        mq.append(&set(b"after", b"x", 1, 0)).unwrap();
        mq.close().unwrap();

        let target = Arc::new(MemoryStore::new());
        let mut follower = ReplicaFollower::new(
            mq.make_reader(0),
            Arc::clone(&target),
            RecordFilter::any(),
            CorruptionPolicy::Skip,
        );
        let stats = follower.run(Duration::from_millis(10)).unwrap();
        assert_eq!(stats.corrupt_skipped, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(target.get(b"after").unwrap(), b"x");
    }

    #[test]
    fn test_garbage_for_other_server_is_not_corrupt() {
        let dir = TempDir::new().unwrap();
        let mq = open(&dir);
        mq.append(&[0xFF, 0x00, 0x00]).unwrap();
        mq.close().unwrap();

        let mut config = ReplicationConfig::default();
        config.server_id = Some(1);
        let target = Arc::new(MemoryStore::new());
        let mut follower = ReplicaFollower::from_config(&mq, target, &config).unwrap();
        assert_eq!(follower.id(), config.follower_id);

        let stats = follower.run(config.poll_interval()).unwrap();
        assert_eq!(stats.not_applicable, 1);
        assert_eq!(stats.corrupt_skipped, 0);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let mq = open(&dir);
        let config = ReplicationConfig {
            poll_interval_ms: 0,
            ..ReplicationConfig::default()
        };
        let result = ReplicaFollower::from_config(&mq, Arc::new(MemoryStore::new()), &config);
        assert!(matches!(result, Err(ReplicationError::InvalidConfig(_))));
    }
}
