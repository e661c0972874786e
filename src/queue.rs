//! Queue Engine — the lease protocol, the retry/DLQ state machine, and the
//! long-polling loop everything else in the crate is built around.

use std::path::Path;
use std::thread;
use std::time::Duration;

use rusqlite::params;

use crate::config::{JoinOptions, PopOptions, PutOptions, QueueConfig, MAX_BATCH_SIZE};
use crate::error::{self, BrokerError};
use crate::id::Id;
use crate::logging;
use crate::store::Store;
use crate::time::now_unix_secs;

/// A leased or peeked row, handed to callers of `pop`, `peek`, and `consume`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Id,
    pub data: Vec<u8>,
    pub queue_name: String,
    pub retry_count: u32,
    pub created_at: i64,
}

enum PopAttempt {
    Delivered(Message),
    Diverted(Id),
    Empty,
}

/// A handle to one broker database file. Cheap to share across threads —
/// all serialization happens at the store level, not in this type.
pub struct Queue {
    store: Store,
    config: QueueConfig,
}

impl Queue {
    pub fn open(path: impl AsRef<Path>, config: QueueConfig) -> Result<Self, BrokerError> {
        let store = Store::open(
            path.as_ref(),
            Duration::from_secs(config.busy_timeout_seconds),
        )?;
        Ok(Self { store, config })
    }

    /// Insert one message, retrying id collisions up to
    /// `opts.retries_on_conflict` times. Data is never partially stored.
    pub fn put(&self, data: &[u8], opts: &PutOptions) -> Result<Id, BrokerError> {
        if opts.visible_after_seconds < 0 {
            return Err(BrokerError::InvalidArgument(
                "visible_after_seconds must not be negative".to_string(),
            ));
        }
        let now = now_unix_secs();
        let visible_after = now + opts.visible_after_seconds;
        let mut attempts = 0u32;
        loop {
            let id = Id::new();
            let id_text = id.to_string();
            let outcome = self.store.with_write_txn(|tx| {
                tx.execute(
                    "INSERT INTO messages (id, queue_name, data, visible_after, retry_count, created_at)
                     VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                    params![id_text, opts.queue_name, data, visible_after, now],
                )?;
                Ok(())
            });
            match outcome {
                Ok(()) => return Ok(id),
                Err(BrokerError::Sqlite(ref e)) if error::is_constraint_violation(e) => {
                    if attempts >= opts.retries_on_conflict {
                        return Err(BrokerError::Conflict(
                            "id generation retries exhausted".to_string(),
                        ));
                    }
                    attempts += 1;
                    thread::sleep(opts.pause_on_conflict);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Insert up to `MAX_BATCH_SIZE` messages in one writer transaction,
    /// all-or-nothing. Returned ids correspond to `items` by position.
    pub fn put_batch(&self, items: &[Vec<u8>], opts: &PutOptions) -> Result<Vec<Id>, BrokerError> {
        if items.len() > MAX_BATCH_SIZE {
            return Err(BrokerError::InvalidArgument(format!(
                "batch of {} items exceeds the cap of {MAX_BATCH_SIZE}",
                items.len()
            )));
        }
        if opts.visible_after_seconds < 0 {
            return Err(BrokerError::InvalidArgument(
                "visible_after_seconds must not be negative".to_string(),
            ));
        }
        let now = now_unix_secs();
        let visible_after = now + opts.visible_after_seconds;
        let mut attempts = 0u32;
        loop {
            let ids: Vec<Id> = items.iter().map(|_| Id::new()).collect();
            let outcome = self.store.with_write_txn(|tx| {
                for (id, data) in ids.iter().zip(items.iter()) {
                    tx.execute(
                        "INSERT INTO messages (id, queue_name, data, visible_after, retry_count, created_at)
                         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                        params![id.to_string(), opts.queue_name, data, visible_after, now],
                    )?;
                }
                Ok(())
            });
            match outcome {
                Ok(()) => return Ok(ids),
                Err(BrokerError::Sqlite(ref e)) if error::is_constraint_violation(e) => {
                    if attempts >= opts.retries_on_conflict {
                        return Err(BrokerError::Conflict(
                            "id generation retries exhausted".to_string(),
                        ));
                    }
                    attempts += 1;
                    thread::sleep(opts.pause_on_conflict);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn parse_row_id(id_text: &str) -> Result<Id, BrokerError> {
        id_text.parse().map_err(|_| {
            let detail = format!("row id {id_text} does not parse as a valid identifier");
            logging::store_corruption(&detail);
            BrokerError::StoreCorruption(detail)
        })
    }

    /// The single-candidate step of the lease protocol: select, then either
    /// divert a poison row to the DLQ or lease the row, each inside its own
    /// writer transaction.
    fn try_pop_once(&self, qname: &str, invisible_seconds: i64) -> Result<PopAttempt, BrokerError> {
        let now = now_unix_secs();
        let max_retries = self.config.max_retries as i64;
        self.store.with_write_txn(|tx| {
            let found = tx.query_row(
                "SELECT id, data, retry_count, created_at FROM messages
                 WHERE queue_name = ?1 AND visible_after <= ?2
                 ORDER BY visible_after ASC, created_at ASC LIMIT 1",
                params![qname, now],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            );

            let (id_text, data, retry_count, created_at) = match found {
                Ok(v) => v,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(PopAttempt::Empty),
                Err(e) => return Err(BrokerError::from(e)),
            };

            if retry_count >= max_retries {
                tx.execute(
                    "INSERT INTO dlq (id, queue_name, data, failed_at, reason)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id_text, qname, data, now, "max retries exceeded"],
                )?;
                tx.execute("DELETE FROM messages WHERE id = ?1", params![id_text])?;
                return Ok(PopAttempt::Diverted(Self::parse_row_id(&id_text)?));
            }

            let new_retry_count = retry_count + 1;
            tx.execute(
                "UPDATE messages SET visible_after = ?1, retry_count = ?2 WHERE id = ?3",
                params![now + invisible_seconds, new_retry_count, id_text],
            )?;

            Ok(PopAttempt::Delivered(Message {
                id: Self::parse_row_id(&id_text)?,
                data,
                queue_name: qname.to_string(),
                retry_count: new_retry_count as u32,
                created_at,
            }))
        })
    }

    /// Lease the next eligible message, long-polling up to
    /// `opts.wait_seconds` if the queue is momentarily empty. Poison
    /// messages encountered along the way are diverted to the DLQ without
    /// pausing; only a genuinely empty candidate set triggers the poll
    /// sleep.
    pub fn pop(&self, qname: &str, opts: &PopOptions) -> Result<Option<Message>, BrokerError> {
        let deadline = now_unix_secs() + opts.wait_seconds.max(0);
        loop {
            match self.try_pop_once(qname, opts.invisible_seconds)? {
                PopAttempt::Delivered(msg) => return Ok(Some(msg)),
                PopAttempt::Diverted(id) => {
                    logging::dlq_transition(qname, &id, "max retries exceeded");
                }
                PopAttempt::Empty => {
                    logging::empty_poll(qname);
                    if opts.wait_seconds <= 0 || now_unix_secs() >= deadline {
                        return Ok(None);
                    }
                    if opts.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                        return Ok(None);
                    }
                    thread::sleep(opts.pause_on_empty_fetch);
                    if opts.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Return the next eligible row without mutating it.
    pub fn peek(&self, qname: &str) -> Result<Option<Message>, BrokerError> {
        let now = now_unix_secs();
        self.store.with_read_txn(|conn| {
            let found = conn.query_row(
                "SELECT id, data, retry_count, created_at FROM messages
                 WHERE queue_name = ?1 AND visible_after <= ?2
                 ORDER BY visible_after ASC, created_at ASC LIMIT 1",
                params![qname, now],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            );
            match found {
                Ok((id_text, data, retry_count, created_at)) => Ok(Some(Message {
                    id: Self::parse_row_id(&id_text)?,
                    data,
                    queue_name: qname.to_string(),
                    retry_count: retry_count as u32,
                    created_at,
                })),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(BrokerError::from(e)),
            }
        })
    }

    /// ACK: delete the row with this id, from any queue. No-op if absent.
    pub fn delete(&self, id: &Id) -> Result<(), BrokerError> {
        self.store.with_write_txn(|tx| {
            tx.execute(
                "DELETE FROM messages WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(())
        })
    }

    /// NACK: diverts to the DLQ if `msg.retry_count` had already reached
    /// `max_retries` at lease time, otherwise makes the message immediately
    /// eligible again. No-op if the row no longer exists.
    pub fn process_failed(&self, msg: &Message, reason: &str) -> Result<(), BrokerError> {
        let diverts = msg.retry_count >= self.config.max_retries;
        let id_text = msg.id.to_string();
        let moved = self.store.with_write_txn(|tx| {
            let now = now_unix_secs();
            if diverts {
                let moved = tx.execute(
                    "INSERT INTO dlq (id, queue_name, data, failed_at, reason)
                     SELECT id, queue_name, data, ?2, ?3 FROM messages WHERE id = ?1",
                    params![id_text, now, reason],
                )?;
                if moved > 0 {
                    tx.execute("DELETE FROM messages WHERE id = ?1", params![id_text])?;
                }
                Ok(moved > 0)
            } else {
                tx.execute(
                    "UPDATE messages SET visible_after = ?1 WHERE id = ?2",
                    params![now, id_text],
                )?;
                Ok(false)
            }
        })?;
        if moved {
            logging::dlq_transition(&msg.queue_name, &msg.id, reason);
        }
        Ok(())
    }

    /// Approximate row count for the queue, regardless of visibility.
    pub fn qsize(&self, qname: &str) -> Result<u64, BrokerError> {
        self.store.with_read_txn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE queue_name = ?1",
                params![qname],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Row count for the queue that is currently visible (eligible for pop).
    pub fn visible_size(&self, qname: &str) -> Result<u64, BrokerError> {
        let now = now_unix_secs();
        self.store.with_read_txn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE queue_name = ?1 AND visible_after <= ?2",
                params![qname, now],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Row count in the DLQ for the queue.
    pub fn dlq_size(&self, qname: &str) -> Result<u64, BrokerError> {
        self.store.with_read_txn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM dlq WHERE queue_name = ?1",
                params![qname],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// True iff no row for `qname` is currently visible.
    pub fn empty(&self, qname: &str) -> Result<bool, BrokerError> {
        Ok(self.visible_size(qname)? == 0)
    }

    /// Delete all rows in `messages` for the queue; with `dlq=true`, also
    /// clears its DLQ rows.
    pub fn clear(&self, qname: &str, dlq: bool) -> Result<(), BrokerError> {
        self.store.with_write_txn(|tx| {
            tx.execute(
                "DELETE FROM messages WHERE queue_name = ?1",
                params![qname],
            )?;
            if dlq {
                tx.execute("DELETE FROM dlq WHERE queue_name = ?1", params![qname])?;
            }
            Ok(())
        })
    }

    /// Block until `empty(qname)` is true, polling at `opts.pause` cadence.
    pub fn join(&self, qname: &str, opts: &JoinOptions) -> Result<(), BrokerError> {
        loop {
            if self.empty(qname)? {
                return Ok(());
            }
            if opts.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                return Err(BrokerError::Cancelled);
            }
            thread::sleep(opts.pause);
            if opts.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                return Err(BrokerError::Cancelled);
            }
        }
    }

    /// Move every DLQ row for the queue back into `messages` with
    /// `retry_count := 0` and `visible_after := now`, in one writer
    /// transaction. Returns the number of rows moved.
    pub fn redrive(&self, qname: &str) -> Result<u64, BrokerError> {
        let now = now_unix_secs();
        let moved = self.store.with_write_txn(|tx| {
            let moved = tx.execute(
                "INSERT INTO messages (id, queue_name, data, visible_after, retry_count, created_at)
                 SELECT id, queue_name, data, ?2, 0, ?2 FROM dlq WHERE queue_name = ?1",
                params![qname, now],
            )?;
            tx.execute("DELETE FROM dlq WHERE queue_name = ?1", params![qname])?;
            Ok(moved as u64)
        })?;
        if moved > 0 {
            logging::redrive(qname, moved);
        }
        Ok(moved)
    }
}
