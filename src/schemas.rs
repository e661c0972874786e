//! SQL schema definitions for the broker's two owned tables.

pub const MESSAGES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        queue_name TEXT NOT NULL DEFAULT 'default',
        data BLOB NOT NULL,
        visible_after INTEGER NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )
";

pub const MESSAGES_INDEX: &str = "
    CREATE INDEX IF NOT EXISTS idx_messages_queue_visible_created
    ON messages(queue_name, visible_after, created_at)
";

pub const DLQ_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS dlq (
        id TEXT PRIMARY KEY,
        queue_name TEXT NOT NULL,
        data BLOB NOT NULL,
        failed_at INTEGER NOT NULL,
        reason TEXT
    )
";

pub const META_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const SCHEMA_VERSION: &str = "1";
