//! Wire layer for the beacon telemetry pipeline.
//!
//! This crate provides:
//! - Transport: the seam the queue uses to reach the collection endpoint
//! - HttpTransport: reqwest-backed default implementation
//! - DeliveryEngine: sequential per-chunk sends with retry, exponential
//!   backoff and retryable/terminal failure classification
//! - RecordingTransport: scriptable test double

mod delivery;
mod error;
pub mod testing;
mod transport;

pub use delivery::{DeliveryEngine, DEFAULT_RETRY_COUNT, MAX_RETRY_COUNT, MIN_RETRY_COUNT};
pub use error::{DeliveryError, TransportError, TransportResult};
pub use transport::{Chunk, HttpTransport, Transport, TransportRequest};
