//! Time-ordered identifier generation.
//!
//! Ids are UUIDv7-shaped: the leading 48 bits are the current UTC time in
//! milliseconds, followed by the version/variant bits, with the remainder
//! cryptographically random. Text form is the canonical 8-4-4-4-12 grouping.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::{ContextV7, Timestamp, Uuid};

use crate::error::BrokerError;

/// Shared per-process v7 context: its internal counter is what makes ids
/// generated within the same millisecond still come out ordered.
static CONTEXT: LazyLock<ContextV7> = LazyLock::new(ContextV7::new);

/// A 128-bit time-sortable message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(Uuid);

impl Id {
    /// Generate a new id from the current time. Monotone within a process:
    /// ids generated back-to-back in the same millisecond still compare in
    /// generation order, via `CONTEXT`'s counter.
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let ts = Timestamp::from_unix(&*CONTEXT, now.as_secs(), now.subsec_nanos());
        Id(Uuid::new_v7(ts))
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Id)
            .map_err(|e| BrokerError::InvalidArgument(format!("not a valid id: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text_form() {
        let id = Id::new();
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-a-uuid".parse::<Id>().is_err());
    }

    #[test]
    fn successive_ids_are_distinct_and_ordered() {
        let a = Id::new();
        let b = Id::new();
        assert_ne!(a, b);
        assert!(a <= b);
    }
}
