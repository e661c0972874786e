use std::thread;
use std::time::Duration;

use duraqueue::{JoinOptions, PopOptions, PutOptions, Queue, QueueConfig};

fn open_queue() -> (tempfile::TempDir, Queue) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broker.db");
    let queue = Queue::open(&path, QueueConfig::default()).unwrap();
    (dir, queue)
}

fn pop_now(queue: &Queue, qname: &str) -> Option<duraqueue::Message> {
    queue
        .pop(
            qname,
            &PopOptions {
                wait_seconds: 0,
                ..PopOptions::default()
            },
        )
        .unwrap()
}

#[test]
fn binary_integrity() {
    let (_dir, queue) = open_queue();
    let payload = [0x00u8, 0x01, 0x02, 0xff];
    queue.put(&payload, &PutOptions::default()).unwrap();
    let msg = pop_now(&queue, "default").unwrap();
    assert_eq!(msg.data, payload.to_vec());
}

#[test]
fn visibility_timeout_round_trip() {
    let (_dir, queue) = open_queue();
    queue.put(b"x", &PutOptions::default()).unwrap();

    let first = queue
        .pop(
            "default",
            &PopOptions {
                invisible_seconds: 2,
                wait_seconds: 0,
                ..PopOptions::default()
            },
        )
        .unwrap()
        .expect("first pop should see the message");
    assert_eq!(first.retry_count, 1);

    assert!(pop_now(&queue, "default").is_none());

    thread::sleep(Duration::from_secs(3));

    let second = pop_now(&queue, "default").expect("message becomes visible again");
    assert_eq!(second.id, first.id);
    assert_eq!(second.retry_count, 2);
}

#[test]
fn poison_pill_reaches_dlq_with_nack_reason() {
    let dir = tempfile::tempdir().unwrap();
    let config = QueueConfig {
        max_retries: 3,
        ..QueueConfig::default()
    };
    let queue = Queue::open(dir.path().join("broker.db"), config).unwrap();

    let id = queue.put(b"bad", &PutOptions::default()).unwrap();

    for _ in 0..4 {
        if let Some(msg) = pop_now(&queue, "default") {
            queue.process_failed(&msg, "handler rejected payload").unwrap();
        }
    }

    assert!(queue.peek("default").unwrap().is_none());
    assert_eq!(queue.dlq_size("default").unwrap(), 1);
    assert_eq!(queue.qsize("default").unwrap(), 0);
    let _ = id;
}

#[test]
fn partitioning_keeps_queues_isolated() {
    let (_dir, queue) = open_queue();
    queue
        .put(
            b"A",
            &PutOptions {
                queue_name: "a".to_string(),
                ..PutOptions::default()
            },
        )
        .unwrap();
    queue
        .put(
            b"B",
            &PutOptions {
                queue_name: "b".to_string(),
                ..PutOptions::default()
            },
        )
        .unwrap();

    let from_a = pop_now(&queue, "a").unwrap();
    assert_eq!(from_a.data, b"A".to_vec());
    assert_eq!(queue.qsize("b").unwrap(), 1);
    assert!(pop_now(&queue, "b").is_some());
}

#[test]
fn redrive_reinstates_dlq_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = QueueConfig {
        max_retries: 1,
        ..QueueConfig::default()
    };
    let queue = Queue::open(dir.path().join("broker.db"), config).unwrap();

    queue.put(b"one", &PutOptions::default()).unwrap();
    queue.put(b"two", &PutOptions::default()).unwrap();

    // max_retries=1: the first lease already brings retry_count to 1, so a
    // single NACK is enough to divert each message.
    let msg1 = pop_now(&queue, "default").unwrap();
    queue.process_failed(&msg1, "simulated failure").unwrap();
    let msg2 = pop_now(&queue, "default").unwrap();
    queue.process_failed(&msg2, "simulated failure").unwrap();

    assert_eq!(queue.dlq_size("default").unwrap(), 2);
    assert_eq!(queue.qsize("default").unwrap(), 0);

    let moved = queue.redrive("default").unwrap();
    assert_eq!(moved, 2);
    assert_eq!(queue.dlq_size("default").unwrap(), 0);
    assert_eq!(queue.qsize("default").unwrap(), 2);

    let redriven = pop_now(&queue, "default").unwrap();
    assert_eq!(redriven.retry_count, 1);
}

#[test]
fn put_batch_preserves_order_and_rejects_oversize() {
    let (_dir, queue) = open_queue();
    let items: Vec<Vec<u8>> = (0..5u8).map(|n| vec![n]).collect();
    let ids = queue.put_batch(&items, &PutOptions::default()).unwrap();
    assert_eq!(ids.len(), 5);

    for expected in items.iter() {
        let msg = pop_now(&queue, "default").unwrap();
        assert_eq!(&msg.data, expected);
    }

    let oversized: Vec<Vec<u8>> = (0..51u8).map(|_| vec![0]).collect();
    let err = queue.put_batch(&oversized, &PutOptions::default()).unwrap_err();
    assert!(matches!(err, duraqueue::BrokerError::InvalidArgument(_)));
    assert_eq!(queue.qsize("default").unwrap(), 0);
}

#[test]
fn pop_on_empty_queue_returns_none_immediately() {
    let (_dir, queue) = open_queue();
    let start = std::time::Instant::now();
    assert!(pop_now(&queue, "default").is_none());
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn delete_and_process_failed_are_noops_on_missing_row() {
    let (_dir, queue) = open_queue();
    queue.put(b"x", &PutOptions::default()).unwrap();
    let msg = pop_now(&queue, "default").unwrap();
    queue.delete(&msg.id).unwrap();
    queue.delete(&msg.id).unwrap();
    queue.process_failed(&msg, "late nack").unwrap();
}

#[test]
fn clear_removes_active_and_optionally_dlq_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = QueueConfig {
        max_retries: 1,
        ..QueueConfig::default()
    };
    let queue = Queue::open(dir.path().join("broker.db"), config).unwrap();

    queue.put(b"one", &PutOptions::default()).unwrap();
    let msg = pop_now(&queue, "default").unwrap();
    queue.process_failed(&msg, "bad").unwrap();
    assert_eq!(queue.dlq_size("default").unwrap(), 1);

    queue.put(b"two", &PutOptions::default()).unwrap();
    queue.clear("default", false).unwrap();
    assert_eq!(queue.qsize("default").unwrap(), 0);
    assert_eq!(queue.dlq_size("default").unwrap(), 1);

    queue.clear("default", true).unwrap();
    assert_eq!(queue.dlq_size("default").unwrap(), 0);
}

#[test]
fn join_returns_once_queue_drains() {
    let (_dir, queue) = open_queue();
    queue.put(b"x", &PutOptions::default()).unwrap();
    let msg = pop_now(&queue, "default").unwrap();
    queue.delete(&msg.id).unwrap();
    queue
        .join(
            "default",
            &JoinOptions {
                pause: Duration::from_millis(10),
                ..JoinOptions::default()
            },
        )
        .unwrap();
}

#[test]
fn visible_after_seconds_delays_eligibility() {
    let (_dir, queue) = open_queue();
    queue
        .put(
            b"delayed",
            &PutOptions {
                visible_after_seconds: 2,
                ..PutOptions::default()
            },
        )
        .unwrap();
    assert!(pop_now(&queue, "default").is_none());
    thread::sleep(Duration::from_secs(3));
    assert!(pop_now(&queue, "default").is_some());
}
