//! Duplicate suppression over a sliding time window.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::warn;

/// Deduplicator mapping content hashes to the timestamp of the event that
/// produced them.
///
/// Ages are measured against the incoming event's own timestamp rather than
/// the wall clock, which keeps the decision deterministic and testable.
/// Expired entries are evicted on every check; there is no separate GC
/// timer. The table is never cleared on flush — duplicates must be rejected
/// across flush boundaries.
pub struct Deduplicator {
    window: Duration,
    entries: HashMap<String, DateTime<Utc>>,
}

impl Deduplicator {
    /// Create a deduplicator with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Check an event's content hash. Returns true if the event is a repeat
    /// within the window; otherwise records the hash and returns false.
    pub fn check(&mut self, hash: &str, timestamp: DateTime<Utc>) -> bool {
        let window = self.window;
        self.entries
            .retain(|_, seen| timestamp.signed_duration_since(*seen) <= window);

        if let Some(seen) = self.entries.get(hash) {
            let ago = timestamp.signed_duration_since(*seen);
            warn!(
                message_id = %hash,
                seconds_ago = ago.num_seconds(),
                "Duplicate event suppressed"
            );
            return true;
        }

        self.entries.insert(hash.to_string(), timestamp);
        false
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
