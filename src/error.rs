//! Error taxonomy.
//!
//! SQLite failures are classified into the kinds below wherever the design
//! names a specific one (busy/locked maps to `Contention`, primary-key
//! collisions feed the `put`/`put_batch` conflict-retry path) rather than
//! leaking a raw `rusqlite::Error` to callers. Anything left over still
//! converts via `#[from]` so nothing is silently dropped.

use rusqlite::ErrorCode;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("contention: writer busy-timeout exceeded")]
    Contention,

    #[error("store corruption: {0}")]
    StoreCorruption(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_display() {
        let err = BrokerError::InvalidArgument("batch too large".to_string());
        assert_eq!(err.to_string(), "invalid argument: batch too large");
    }

    #[test]
    fn contention_display() {
        assert_eq!(
            BrokerError::Contention.to_string(),
            "contention: writer busy-timeout exceeded"
        );
    }

    #[test]
    fn cancelled_display() {
        assert_eq!(BrokerError::Cancelled.to_string(), "operation cancelled");
    }

    #[test]
    fn store_corruption_display() {
        let err = BrokerError::StoreCorruption("bad row".to_string());
        assert_eq!(err.to_string(), "store corruption: bad row");
    }
}
