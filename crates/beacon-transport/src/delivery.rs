//! Delivery engine: per-chunk sends with retry, backoff and failure
//! classification.

use crate::{Chunk, DeliveryError, Transport, TransportError, TransportRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default number of delivery attempts per chunk.
pub const DEFAULT_RETRY_COUNT: u32 = 3;
/// Bounds for the configurable attempt count.
pub const MIN_RETRY_COUNT: u32 = 1;
pub const MAX_RETRY_COUNT: u32 = 5;

/// Delivery engine for sending chunks to the collection endpoint.
///
/// Chunks belonging to one batch are sent sequentially, never concurrently,
/// so the shared keepalive byte budget holds across the whole batch.
pub struct DeliveryEngine {
    transport: Arc<dyn Transport>,
    retry_count: u32,
}

impl DeliveryEngine {
    /// Create a new engine. `retry_count` is clamped to [1, 5].
    pub fn new(transport: Arc<dyn Transport>, retry_count: u32) -> Self {
        Self {
            transport,
            retry_count: retry_count.clamp(MIN_RETRY_COUNT, MAX_RETRY_COUNT),
        }
    }

    /// The clamped attempt budget per chunk.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Send every chunk of a batch in order.
    ///
    /// A failing chunk does not prevent later chunks from being attempted;
    /// only the first error is surfaced to the caller.
    pub async fn send_all(&self, chunks: &[Chunk]) -> Result<(), DeliveryError> {
        let mut first_error: Option<DeliveryError> = None;

        for chunk in chunks {
            if let Err(e) = self.send_chunk(chunk).await {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Send one chunk, retrying transient failures with exponential backoff.
    ///
    /// Delay before attempt `n + 1` is `2^n` seconds. Terminal failures
    /// (4xx other than 429) return immediately.
    pub async fn send_chunk(&self, chunk: &Chunk) -> Result<(), DeliveryError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = TransportRequest {
                body: chunk.body.clone(),
                keepalive: chunk.keepalive_safe,
            };

            match self.transport.send(request).await {
                Ok(()) => {
                    info!(
                        events = chunk.event_count,
                        bytes = chunk.body.len(),
                        attempt = attempt,
                        "Chunk delivered"
                    );
                    return Ok(());
                }
                Err(TransportError::Status { status, body }) if status < 500 && status != 429 => {
                    error!(
                        status = status,
                        events = chunk.event_count,
                        "Terminal delivery failure"
                    );
                    return Err(DeliveryError::Terminal { status, body });
                }
                Err(e) => {
                    if attempt >= self.retry_count {
                        error!(
                            attempt = attempt,
                            events = chunk.event_count,
                            error = %e,
                            "Retries exhausted"
                        );
                        return Err(DeliveryError::RetriesExhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = Duration::from_secs(1u64 << attempt);
                    warn!(
                        attempt = attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Chunk send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    fn chunk(body: &[u8]) -> Chunk {
        Chunk {
            body: body.to_vec(),
            event_count: 1,
            keepalive_safe: true,
        }
    }

    #[test]
    fn retry_count_is_clamped() {
        let transport = Arc::new(RecordingTransport::new());
        assert_eq!(DeliveryEngine::new(transport.clone(), 0).retry_count(), 1);
        assert_eq!(DeliveryEngine::new(transport.clone(), 3).retry_count(), 3);
        assert_eq!(DeliveryEngine::new(transport, 99).retry_count(), 5);
    }

    #[tokio::test]
    async fn send_chunk_succeeds_first_try() {
        let transport = Arc::new(RecordingTransport::new());
        let engine = DeliveryEngine::new(transport.clone(), 3);

        engine.send_chunk(&chunk(b"[{}]")).await.unwrap();
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_chunk_retries_with_increasing_delays() {
        let transport = Arc::new(RecordingTransport::new());
        // Two transient failures, then success: 3 attempts total.
        transport.script_failure(TransportError::Network("refused".into()));
        transport.script_failure(TransportError::Status {
            status: 503,
            body: "unavailable".into(),
        });
        let engine = DeliveryEngine::new(transport.clone(), 5);

        engine.send_chunk(&chunk(b"[{}]")).await.unwrap();

        let times = transport.request_times();
        assert_eq!(times.len(), 3);
        // Backoff is 2^1 = 2s, then 2^2 = 4s: strictly increasing.
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert_eq!(first_gap, Duration::from_secs(2));
        assert_eq!(second_gap, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn send_chunk_gives_up_at_retry_count() {
        let transport = Arc::new(RecordingTransport::new());
        for _ in 0..10 {
            transport.script_failure(TransportError::Network("refused".into()));
        }
        let engine = DeliveryEngine::new(transport.clone(), 3);

        let err = engine.send_chunk(&chunk(b"[{}]")).await.unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn send_chunk_429_is_retried() {
        let transport = Arc::new(RecordingTransport::new());
        transport.script_failure(TransportError::Status {
            status: 429,
            body: "slow down".into(),
        });
        let engine = DeliveryEngine::new(transport.clone(), 3);

        engine.send_chunk(&chunk(b"[{}]")).await.unwrap();
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn send_chunk_4xx_is_terminal() {
        let transport = Arc::new(RecordingTransport::new());
        transport.script_failure(TransportError::Status {
            status: 400,
            body: "bad payload".into(),
        });
        let engine = DeliveryEngine::new(transport.clone(), 5);

        let err = engine.send_chunk(&chunk(b"[{}]")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Terminal { status: 400, .. }));
        // No retry for terminal failures.
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn send_all_attempts_every_chunk_and_reports_first_error() {
        let transport = Arc::new(RecordingTransport::new());
        transport.script_failure(TransportError::Status {
            status: 404,
            body: "gone".into(),
        });
        let engine = DeliveryEngine::new(transport.clone(), 1);

        let chunks = vec![chunk(b"[1]"), chunk(b"[2]"), chunk(b"[3]")];
        let err = engine.send_all(&chunks).await.unwrap_err();

        // First chunk failed terminally; the other two were still sent.
        assert!(matches!(err, DeliveryError::Terminal { status: 404, .. }));
        assert_eq!(transport.request_count(), 3);
        assert_eq!(transport.request_bodies()[1], b"[2]".to_vec());
        assert_eq!(transport.request_bodies()[2], b"[3]".to_vec());
    }

    #[tokio::test]
    async fn send_all_empty_is_ok() {
        let transport = Arc::new(RecordingTransport::new());
        let engine = DeliveryEngine::new(transport.clone(), 3);
        engine.send_all(&[]).await.unwrap();
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn send_all_keeps_chunk_order() {
        let transport = Arc::new(RecordingTransport::new());
        let engine = DeliveryEngine::new(transport.clone(), 3);

        let chunks = vec![chunk(b"[1]"), chunk(b"[2]")];
        engine.send_all(&chunks).await.unwrap();

        let bodies = transport.request_bodies();
        assert_eq!(bodies, vec![b"[1]".to_vec(), b"[2]".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn n_failures_means_n_plus_one_sends() {
        // Property from the retry contract: N consecutive retryable failures
        // (N < retry budget) produce exactly N+1 attempts.
        for n in 0..3u32 {
            let transport = Arc::new(RecordingTransport::new());
            for _ in 0..n {
                transport.script_failure(TransportError::Network("refused".into()));
            }
            let engine = DeliveryEngine::new(transport.clone(), 5);

            engine.send_chunk(&chunk(b"[{}]")).await.unwrap();

            assert_eq!(transport.request_count(), (n + 1) as usize);
        }
    }
}
