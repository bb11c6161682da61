//! Test double for the transport seam.
//!
//! Exported so downstream crates can exercise queue behavior without a
//! network. Outcomes are scripted: each scripted failure is consumed by one
//! request, after which requests succeed.

use crate::{Transport, TransportError, TransportRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Recording transport that captures every request and replays scripted
/// failures.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<TransportRequest>>,
    request_times: Mutex<Vec<Instant>>,
    scripted: Mutex<VecDeque<TransportError>>,
    /// Artificial latency per request, for overlap/ordering tests.
    latency: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next unserved request.
    pub fn script_failure(&self, error: TransportError) {
        self.scripted.lock().expect("lock poisoned").push_back(error);
    }

    /// Make every request take `latency` of (virtual) time.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("lock poisoned") = Some(latency);
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("lock poisoned").len()
    }

    /// Bodies of all received requests, in arrival order.
    pub fn request_bodies(&self) -> Vec<Vec<u8>> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|r| r.body.clone())
            .collect()
    }

    /// Keepalive flags of all received requests, in arrival order.
    pub fn request_keepalive_flags(&self) -> Vec<bool> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|r| r.keepalive)
            .collect()
    }

    /// Arrival instants of all received requests.
    pub fn request_times(&self) -> Vec<Instant> {
        self.request_times.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: TransportRequest) -> Result<(), TransportError> {
        self.request_times
            .lock()
            .expect("lock poisoned")
            .push(Instant::now());
        self.requests.lock().expect("lock poisoned").push(request);

        let latency = *self.latency.lock().expect("lock poisoned");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let next = self.scripted.lock().expect("lock poisoned").pop_front();
        match next {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
