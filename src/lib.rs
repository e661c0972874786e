//! `duraqueue` — an embedded, persistent, multi-queue message broker backed
//! by a single SQLite file, offering SQS-style semantics: producers enqueue
//! opaque binary payloads, consumers lease messages with a visibility
//! timeout, unacknowledged leases re-appear, and messages exceeding a retry
//! budget are diverted to a dead-letter queue.
//!
//! At-least-once delivery only — no cross-host replication, no strict
//! ordering across workers, no priority queues.
//!
//! ```no_run
//! use duraqueue::{PutOptions, PopOptions, Queue, QueueConfig};
//!
//! let queue = Queue::open("jobs.db", QueueConfig::default())?;
//! let id = queue.put(b"payload", &PutOptions::default())?;
//! if let Some(msg) = queue.pop("default", &PopOptions::default())? {
//!     queue.delete(&msg.id)?;
//! }
//! # Ok::<(), duraqueue::BrokerError>(())
//! ```

mod cancel;
mod config;
mod consume;
mod db;
mod error;
mod id;
mod logging;
mod queue;
mod schemas;
mod store;
mod time;

pub use cancel::CancelToken;
pub use config::{
    ConsumeOptions, JoinOptions, PopOptions, PutOptions, QueueConfig, MAX_BATCH_SIZE,
};
pub use error::BrokerError;
pub use id::Id;
pub use queue::{Message, Queue};
