//! Low-level connection setup: PRAGMAs and idempotent schema application.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::BrokerError;
use crate::schemas;

/// Open a connection the way every connection this crate opens must be
/// configured: WAL journal mode plus the caller-supplied busy timeout.
pub fn connect(path: &Path, busy_timeout: Duration) -> Result<Connection, BrokerError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    Ok(conn)
}

/// Apply schema statements idempotently and record the applied version.
/// Safe to call on every open.
pub fn migrate(conn: &Connection) -> Result<(), BrokerError> {
    conn.execute(schemas::META_SCHEMA, [])?;
    conn.execute(schemas::MESSAGES_SCHEMA, [])?;
    conn.execute(schemas::MESSAGES_INDEX, [])?;
    conn.execute(schemas::DLQ_SCHEMA, [])?;
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [schemas::SCHEMA_VERSION],
    )?;
    Ok(())
}
