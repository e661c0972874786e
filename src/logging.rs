//! Structured log events at the severities the broker's observability
//! contract calls for: INFO for DLQ transitions and redrives, DEBUG for
//! empty polls and lease contention. No subscriber is installed here —
//! the host wires up whichever `tracing` subscriber it wants.

use crate::id::Id;

pub fn dlq_transition(queue_name: &str, id: &Id, reason: &str) {
    tracing::info!(queue = queue_name, %id, reason, "message moved to dead-letter queue");
}

pub fn redrive(queue_name: &str, count: u64) {
    tracing::info!(queue = queue_name, count, "dlq rows redriven back into queue");
}

pub fn empty_poll(queue_name: &str) {
    tracing::debug!(queue = queue_name, "pop found no eligible message");
}

pub fn contention() {
    tracing::debug!("writer busy-timeout exceeded");
}

pub fn store_corruption(detail: &str) {
    tracing::error!(detail, "store corruption detected");
}
