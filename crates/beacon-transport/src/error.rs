//! Transport and delivery error types.

use thiserror::Error;

/// Error from a single transport attempt.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Network-level failure (connection refused, timeout, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint responded with a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// Whether this failure is worth retrying.
    ///
    /// Network failures, 5xx and 429 are transient; any other 4xx means the
    /// request itself is bad and repeating it cannot help.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Status { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

/// Classified outcome of delivering a chunk (or a whole batch).
///
/// Cloneable so one failure can be fanned out to every item callback in the
/// batch it belongs to.
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    /// A retryable failure persisted through every allowed attempt.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: String,
    },

    /// A terminal failure (4xx other than 429); no retry was attempted.
    #[error("terminal delivery failure (status {status}): {body}")]
    Terminal { status: u16, body: String },

    /// A batch could not be serialized for the wire.
    #[error("batch serialization failed: {0}")]
    Serialization(String),
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;
