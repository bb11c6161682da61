//! Transport seam for the collection endpoint.
//!
//! The queue only ever talks to the endpoint through the [`Transport`]
//! trait, so hosts can substitute their own wire layer (or a recording
//! double in tests). [`HttpTransport`] is the default reqwest-backed
//! implementation.

use crate::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Request timeout for endpoint calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A wire-ready subdivision of a batch: one serialized JSON array body,
/// sent as a single transport request.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// UTF-8 bytes of the JSON array body.
    pub body: Vec<u8>,
    /// Number of events serialized into the body.
    pub event_count: usize,
    /// Whether the body fits under the keepalive byte ceiling and may be
    /// sent with "survive host teardown" semantics.
    pub keepalive_safe: bool,
}

/// One outbound request to the collection endpoint.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// JSON array body.
    pub body: Vec<u8>,
    /// Request "send even while the host is terminating" semantics.
    ///
    /// Advisory for transports where every request already survives the
    /// caller (native HTTP); load-bearing for embeddings with a real
    /// teardown-safe send mode.
    pub keepalive: bool,
}

/// Transport collaborator interface.
///
/// Implementations must not panic; all failures come back as
/// [`TransportError`] so the delivery engine can classify them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request; `Ok(())` means the endpoint accepted the body.
    async fn send(&self, request: TransportRequest) -> Result<(), TransportError>;
}

/// HTTP transport for the collection endpoint.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    write_key: String,
}

impl HttpTransport {
    /// Create a new HTTP transport authenticated with the given write key.
    pub fn new(endpoint: impl Into<String>, write_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
            write_key: write_key.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<(), TransportError> {
        debug!(
            endpoint = %self.endpoint,
            bytes = request.body.len(),
            keepalive = request.keepalive,
            "Sending chunk"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.write_key))
            .header("Content-Type", "application/json")
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
