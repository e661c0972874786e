//! Store Adapter — read/write connection separation and the
//! immediate-writer transaction primitive the Queue Engine is built on.
//!
//! Writes are serialized through a process-local mutex with a fresh
//! connection opened per write, so the mutex (not a held connection) is the
//! serialization point. Reads open their own fresh, unlocked connection and
//! rely on WAL for concurrent readers. Concurrent open from other processes
//! is handled by SQLite's own file locking plus the busy timeout.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;

use crate::db;
use crate::error::{self, BrokerError};
use crate::logging;

pub struct Store {
    path: PathBuf,
    busy_timeout: Duration,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, BrokerError> {
        let conn = db::connect(path, busy_timeout)?;
        db::migrate(&conn)?;
        Ok(Self {
            path: path.to_path_buf(),
            busy_timeout,
            write_lock: Mutex::new(()),
        })
    }

    /// Begin an immediate-writer transaction, run `f`, commit on success,
    /// roll back on any failure. The in-process write lock is released on
    /// every exit path via the guard's drop.
    pub fn with_write_txn<F, R>(&self, f: F) -> Result<R, BrokerError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<R, BrokerError>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| BrokerError::StoreCorruption("write lock poisoned".to_string()))?;

        let conn = db::connect(&self.path, self.busy_timeout)?;

        conn.execute_batch("BEGIN IMMEDIATE").map_err(|e| {
            if error::is_busy(&e) {
                logging::contention();
                BrokerError::Contention
            } else {
                BrokerError::Sqlite(e)
            }
        })?;

        let tx = conn.unchecked_transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Run `f` against a fresh, unlocked read connection.
    pub fn with_read_txn<F, R>(&self, f: F) -> Result<R, BrokerError>
    where
        F: FnOnce(&Connection) -> Result<R, BrokerError>,
    {
        let conn = db::connect(&self.path, self.busy_timeout)?;
        f(&conn)
    }
}
