//! Update Log Over a Persisted Queue
//!
//! A store with a `QueueLogger` attached must leave exactly one encoded record
//! in the queue per mutation, in mutation order, tagged with the logger's ids.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kvreplica::mq::{MessageQueue, OpenMode, QueueMessage, QueueReader, ReadOutcome};
use kvreplica::store::{KvStore, MemoryStore, ShardedStore, StoreError};
use kvreplica::ulog::{decode_record, Mutation, QueueLogger, UlogError};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn open_queue(dir: &TempDir) -> Arc<MessageQueue> {
    MessageQueue::open(dir.path().join("ulog"), 1 << 20, OpenMode::Truncate)
        .expect("Failed to open queue")
}

fn next_message(reader: &mut QueueReader) -> QueueMessage {
    match reader.read(Duration::ZERO).expect("read failed") {
        ReadOutcome::Message(message) => message,
        other => panic!("expected a message, got {:?}", other),
    }
}

fn drain(reader: &mut QueueReader) -> Vec<Vec<u8>> {
    let mut records = Vec::new();
    while let ReadOutcome::Message(message) = reader.read(Duration::ZERO).expect("read failed") {
        records.push(message.data);
    }
    records
}

// =============================================================================
// Record Stream
// =============================================================================

#[test]
fn test_store_mutations_become_queue_records() {
    let dir = TempDir::new().unwrap();
    let mq = open_queue(&dir);
    let store = MemoryStore::new();
    store.attach_logger(Arc::new(QueueLogger::new(Arc::clone(&mq), 1, 2)));

    let begin = Utc::now().timestamp_millis();
    store.set(b"one", b"first").unwrap();
    store.set(b"two", b"second").unwrap();
    store.remove(b"two").unwrap();
    store.clear().unwrap();
    let end = Utc::now().timestamp_millis();

    let expected: [&[u8]; 4] = [
        b"\xA1\x01\x02\x03\x05onefirst",
        b"\xA1\x01\x02\x03\x06twosecond",
        b"\xA2\x01\x02\x03two",
        b"\xA3\x01\x02",
    ];

    let mut reader = mq.make_reader(0);
    for want in expected {
        let message = next_message(&mut reader);
        assert_eq!(message.data, want);
        assert!(message.timestamp >= begin && message.timestamp <= end);
    }
    assert_eq!(reader.read(Duration::ZERO).unwrap(), ReadOutcome::NoData);
}

#[test]
fn test_failed_mutations_are_not_logged() {
    let dir = TempDir::new().unwrap();
    let mq = open_queue(&dir);
    let store = MemoryStore::new();
    store.attach_logger(Arc::new(QueueLogger::new(Arc::clone(&mq), 1, 2)));

    assert!(matches!(store.remove(b"missing"), Err(StoreError::NotFound)));

    let mut reader = mq.make_reader(0);
    assert_eq!(reader.read(Duration::ZERO).unwrap(), ReadOutcome::NoData);
}

#[test]
fn test_append_is_logged_as_resulting_value() {
    let dir = TempDir::new().unwrap();
    let mq = open_queue(&dir);
    let store = MemoryStore::new();
    store.attach_logger(Arc::new(QueueLogger::new(Arc::clone(&mq), 7, 0)));

    store.append(b"k", b"a", b":").unwrap();
    store.append(b"k", b"b", b":").unwrap();

    let records = drain(&mut mq.make_reader(0));
    assert_eq!(records.len(), 2);
    let last = decode_record(&records[1]).unwrap();
    assert_eq!(last.server_id, 7);
    assert_eq!(last.mutation, Mutation::Set { key: b"k", value: b"a:b" });
}

#[test]
fn test_detached_logger_stops_logging() {
    let dir = TempDir::new().unwrap();
    let mq = open_queue(&dir);
    let store = MemoryStore::new();
    store.attach_logger(Arc::new(QueueLogger::new(Arc::clone(&mq), 1, 2)));
    store.set(b"logged", b"1").unwrap();
    assert!(store.detach_logger().is_some());
    store.set(b"silent", b"2").unwrap();

    assert_eq!(drain(&mut mq.make_reader(0)).len(), 1);
}

#[test]
fn test_closed_queue_surfaces_as_update_log_failure() {
    let dir = TempDir::new().unwrap();
    let mq = open_queue(&dir);
    let store = MemoryStore::new();
    store.attach_logger(Arc::new(QueueLogger::new(Arc::clone(&mq), 1, 2)));
    mq.close().unwrap();

    let err = store.set(b"k", b"v").unwrap_err();
    match err {
        StoreError::UpdateLog(inner) => assert!(matches!(*inner, UlogError::Queue(_))),
        other => panic!("expected an update log failure, got {:?}", other),
    }
    // The local mutation stands.
    assert_eq!(store.get(b"k").unwrap(), b"v");
}

// =============================================================================
// Sharded Store
// =============================================================================

#[test]
fn test_sharded_clear_is_logged_once() {
    let dir = TempDir::new().unwrap();
    let mq = open_queue(&dir);
    let store = ShardedStore::new(4);
    store.attach_logger(Arc::new(QueueLogger::new(Arc::clone(&mq), 1, 0)));

    for i in 0..16u32 {
        store.set(format!("key{}", i).as_bytes(), b"v").unwrap();
    }
    store.clear().unwrap();

    let records = drain(&mut mq.make_reader(0));
    assert_eq!(records.len(), 17);
    let clears = records.iter().filter(|r| r[0] == 0xA3).count();
    assert_eq!(clears, 1);
    assert_eq!(store.count(), 0);
}

#[test]
fn test_sharded_clear_completes_when_queue_is_closed() {
    let dir = TempDir::new().unwrap();
    let mq = open_queue(&dir);
    let store = ShardedStore::new(4);
    for i in 0..32u32 {
        store.set(format!("key{}", i).as_bytes(), b"v").unwrap();
    }
    store.attach_logger(Arc::new(QueueLogger::new(Arc::clone(&mq), 1, 0)));
    mq.close().unwrap();

    let err = store.clear().unwrap_err();
    assert_eq!(err.code(), "KV_STORE_UPDATE_LOG_FAILED");
    // The local clear stands on every shard.
    assert_eq!(store.count(), 0);
}

#[test]
fn test_per_shard_loggers_tag_shard_index() {
    let dir = TempDir::new().unwrap();
    let mq = open_queue(&dir);
    let store = ShardedStore::new(3);
    store.attach_shard_loggers(|index| {
        Arc::new(QueueLogger::new(Arc::clone(&mq), 9, index as u64))
    });

    let key = b"routed";
    store.set(key, b"v").unwrap();

    let records = drain(&mut mq.make_reader(0));
    assert_eq!(records.len(), 1);
    let decoded = decode_record(&records[0]).unwrap();
    assert_eq!(decoded.server_id, 9);
    assert_eq!(decoded.shard_index, store.shard_index(key) as u64);
}
