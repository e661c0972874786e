//! Configuration and per-call options.

use std::env;
use std::time::Duration;

use crate::cancel::CancelToken;

/// Maximum number of items accepted by a single `put_batch` call.
pub const MAX_BATCH_SIZE: usize = 50;

/// Construction-time configuration for a `Queue`.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_retries: u32,
    pub busy_timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            busy_timeout_seconds: 5,
        }
    }
}

impl QueueConfig {
    /// Defaults, overridden by `DURAQUEUE_MAX_RETRIES` /
    /// `DURAQUEUE_BUSY_TIMEOUT_SECS` when set and parseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(raw) = env::var("DURAQUEUE_MAX_RETRIES") {
            if let Ok(parsed) = raw.parse() {
                cfg.max_retries = parsed;
            }
        }
        if let Ok(raw) = env::var("DURAQUEUE_BUSY_TIMEOUT_SECS") {
            if let Ok(parsed) = raw.parse() {
                cfg.busy_timeout_seconds = parsed;
            }
        }
        cfg
    }
}

#[derive(Debug, Clone)]
pub struct PutOptions {
    pub queue_name: String,
    pub visible_after_seconds: i64,
    pub retries_on_conflict: u32,
    pub pause_on_conflict: Duration,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            queue_name: "default".to_string(),
            visible_after_seconds: 0,
            retries_on_conflict: 3,
            pause_on_conflict: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PopOptions {
    pub invisible_seconds: i64,
    pub wait_seconds: i64,
    pub pause_on_empty_fetch: Duration,
    pub cancel: Option<CancelToken>,
}

impl Default for PopOptions {
    fn default() -> Self {
        Self {
            invisible_seconds: 60,
            wait_seconds: 20,
            pause_on_empty_fetch: Duration::from_millis(50),
            cancel: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinOptions {
    pub pause: Duration,
    pub cancel: Option<CancelToken>,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            pause: Duration::from_millis(50),
            cancel: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsumeOptions {
    pub queue_name: String,
    pub invisible_on_receive: i64,
    pub wait_seconds: i64,
    pub pause_on_empty_fetch: Duration,
    pub cancel: Option<CancelToken>,
}

impl Default for ConsumeOptions {
    fn default() -> Self {
        Self {
            queue_name: "default".to_string(),
            invisible_on_receive: 60,
            wait_seconds: 20,
            pause_on_empty_fetch: Duration::from_millis(50),
            cancel: None,
        }
    }
}

impl ConsumeOptions {
    pub(crate) fn to_pop_options(&self) -> PopOptions {
        PopOptions {
            invisible_seconds: self.invisible_on_receive,
            wait_seconds: self.wait_seconds,
            pause_on_empty_fetch: self.pause_on_empty_fetch,
            cancel: self.cancel.clone(),
        }
    }
}
