//! Queue configuration with documented defaults and clamping.

use beacon_transport::{DEFAULT_RETRY_COUNT, MAX_RETRY_COUNT, MIN_RETRY_COUNT};
use std::time::Duration;

/// Default number of items that triggers an automatic flush.
pub const DEFAULT_FLUSH_AT: usize = 20;
/// Bounds for `flush_at`.
pub const MIN_FLUSH_AT: usize = 1;
pub const MAX_FLUSH_AT: usize = 20;

/// Default cumulative serialized size that triggers an automatic flush.
pub const DEFAULT_MAX_QUEUE_BYTES: usize = 500 * 1024;
/// Bounds for `max_queue_bytes`.
pub const MIN_MAX_QUEUE_BYTES: usize = 200;
pub const MAX_MAX_QUEUE_BYTES: usize = 500 * 1024;

/// Default idle flush interval.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
/// Bounds for `flush_interval`.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(300);

/// Default duplicate-suppression window. Deliberately longer than a flush
/// cycle so duplicates are still rejected across flush boundaries.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(60);

/// Configuration for the telemetry queue.
///
/// All thresholds are clamped to their documented bounds when the queue is
/// constructed, so a misconfigured host cannot disable batching or starve
/// the idle timer.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Collection endpoint URL.
    pub endpoint: String,
    /// Write key identifying the account events belong to.
    pub write_key: String,
    /// Item count that forces an immediate flush. Clamped to [1, 20].
    pub flush_at: usize,
    /// Queued byte size that forces an immediate flush.
    /// Clamped to [200 B, 500 KiB].
    pub max_queue_bytes: usize,
    /// Idle timer duration. Clamped to [10 s, 300 s].
    pub flush_interval: Duration,
    /// Delivery attempts per chunk. Clamped to [1, 5].
    pub retry_count: u32,
    /// Window during which an identical content hash is a repeat.
    pub dedup_window: Duration,
}

impl QueueConfig {
    /// Create a configuration with default thresholds.
    pub fn new(endpoint: impl Into<String>, write_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            write_key: write_key.into(),
            flush_at: DEFAULT_FLUSH_AT,
            max_queue_bytes: DEFAULT_MAX_QUEUE_BYTES,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            retry_count: DEFAULT_RETRY_COUNT,
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }

    /// Set the item-count flush trigger.
    pub fn with_flush_at(mut self, flush_at: usize) -> Self {
        self.flush_at = flush_at;
        self
    }

    /// Set the byte-size flush trigger.
    pub fn with_max_queue_bytes(mut self, max_queue_bytes: usize) -> Self {
        self.max_queue_bytes = max_queue_bytes;
        self
    }

    /// Set the idle timer duration.
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Set the delivery attempt budget per chunk.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the duplicate-suppression window.
    pub fn with_dedup_window(mut self, dedup_window: Duration) -> Self {
        self.dedup_window = dedup_window;
        self
    }

    /// Return a copy with every threshold clamped to its documented bounds.
    pub fn clamped(mut self) -> Self {
        self.flush_at = self.flush_at.clamp(MIN_FLUSH_AT, MAX_FLUSH_AT);
        self.max_queue_bytes = self
            .max_queue_bytes
            .clamp(MIN_MAX_QUEUE_BYTES, MAX_MAX_QUEUE_BYTES);
        self.flush_interval = self
            .flush_interval
            .clamp(MIN_FLUSH_INTERVAL, MAX_FLUSH_INTERVAL);
        self.retry_count = self.retry_count.clamp(MIN_RETRY_COUNT, MAX_RETRY_COUNT);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = QueueConfig::new("https://collect.example.com/v1/batch", "wk-1");
        assert_eq!(config.flush_at, 20);
        assert_eq!(config.max_queue_bytes, 500 * 1024);
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.dedup_window, Duration::from_secs(60));
    }

    #[test]
    fn builder_methods_set_thresholds() {
        let config = QueueConfig::new("https://collect.example.com", "wk-1")
            .with_flush_at(5)
            .with_max_queue_bytes(1024)
            .with_flush_interval(Duration::from_secs(60))
            .with_retry_count(2)
            .with_dedup_window(Duration::from_secs(120));

        assert_eq!(config.flush_at, 5);
        assert_eq!(config.max_queue_bytes, 1024);
        assert_eq!(config.flush_interval, Duration::from_secs(60));
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.dedup_window, Duration::from_secs(120));
    }

    #[test]
    fn clamped_pulls_values_into_bounds() {
        let mut config = QueueConfig::new("https://collect.example.com", "wk-1");
        config.flush_at = 0;
        config.max_queue_bytes = 1;
        config.flush_interval = Duration::from_secs(1);
        config.retry_count = 50;

        let clamped = config.clamped();
        assert_eq!(clamped.flush_at, 1);
        assert_eq!(clamped.max_queue_bytes, 200);
        assert_eq!(clamped.flush_interval, Duration::from_secs(10));
        assert_eq!(clamped.retry_count, 5);
    }

    #[test]
    fn clamped_keeps_in_range_values() {
        let mut config = QueueConfig::new("https://collect.example.com", "wk-1");
        config.flush_at = 10;
        config.flush_interval = Duration::from_secs(120);

        let clamped = config.clamped();
        assert_eq!(clamped.flush_at, 10);
        assert_eq!(clamped.flush_interval, Duration::from_secs(120));
    }

    #[test]
    fn clamped_caps_oversized_thresholds() {
        let mut config = QueueConfig::new("https://collect.example.com", "wk-1");
        config.flush_at = 1000;
        config.max_queue_bytes = 10 * 1024 * 1024;
        config.flush_interval = Duration::from_secs(3600);

        let clamped = config.clamped();
        assert_eq!(clamped.flush_at, 20);
        assert_eq!(clamped.max_queue_bytes, 500 * 1024);
        assert_eq!(clamped.flush_interval, Duration::from_secs(300));
    }
}
