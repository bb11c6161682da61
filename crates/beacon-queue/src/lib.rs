//! Batching telemetry queue for the beacon SDK.
//!
//! This crate provides:
//! - TelemetryQueue: in-memory batching queue with count, byte-size and
//!   idle-timer flush triggers, serialized flushes and FIFO batch order
//! - Deduplicator: content-hash duplicate suppression over a sliding window
//! - partition: byte-ceiling-aware chunking for keepalive-safe delivery
//! - LifecycleTrigger: collapses redundant host leave signals into one
//!   flush per logical leave

mod config;
mod dedup;
mod event;
mod lifecycle;
mod queue;
mod splitter;

pub use config::{
    QueueConfig, DEFAULT_DEDUP_WINDOW, DEFAULT_FLUSH_AT, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_MAX_QUEUE_BYTES, MAX_FLUSH_AT, MAX_FLUSH_INTERVAL, MAX_MAX_QUEUE_BYTES, MIN_FLUSH_AT,
    MIN_FLUSH_INTERVAL, MIN_MAX_QUEUE_BYTES,
};
pub use dedup::Deduplicator;
pub use event::{content_hash, EventKind, EventRecord, OutboundEvent};
pub use lifecycle::{LeaveEvent, LifecycleSignal, LifecycleTrigger};
pub use queue::{
    BatchPayload, DeliveryCallback, DeliveryResult, ErrorHandler, FlushOutcome, TelemetryQueue,
};
pub use splitter::{partition, KEEPALIVE_BODY_CEILING};
