//! Batching queue: the central buffer of the delivery pipeline.
//!
//! Owns enqueue/flush decisions and outbound sequencing. Events arrive
//! fully enriched, pass the deduplicator, and wait in memory until one of
//! three triggers fires: item count, cumulative byte size, or the idle
//! timer. A flush drains up to `flush_at` items FIFO, stamps them with one
//! shared `sent_at`, partitions them into wire-safe chunks and hands those
//! to the delivery engine. At most one flush is in flight at a time.

use crate::config::QueueConfig;
use crate::dedup::Deduplicator;
use crate::event::{content_hash, EventRecord, OutboundEvent};
use crate::lifecycle::{LifecycleSignal, LifecycleTrigger};
use crate::splitter::{partition, KEEPALIVE_BODY_CEILING};
use beacon_transport::{DeliveryEngine, DeliveryError, HttpTransport, Transport};
use chrono::Utc;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// The batch a flush attempted, shared with every item callback.
pub type BatchPayload = Arc<[OutboundEvent]>;

/// Per-item completion: the full batch on success, the first classified
/// error otherwise. Resolved at most once.
pub type DeliveryResult = Result<BatchPayload, DeliveryError>;

/// Optional per-item completion callback.
pub type DeliveryCallback = Box<dyn FnOnce(DeliveryResult) + Send>;

/// Optional host-supplied error handler, invoked once per failed flush.
pub type ErrorHandler = Box<dyn Fn(&DeliveryError) + Send + Sync>;

/// Outcome of one flush attempt.
#[derive(Debug, Clone)]
pub struct FlushOutcome {
    /// The events this flush attempted to deliver (empty if the queue was
    /// empty).
    pub attempted: BatchPayload,
    /// The first error encountered, if any chunk failed.
    pub error: Option<DeliveryError>,
}

impl FlushOutcome {
    fn empty() -> Self {
        Self {
            attempted: Vec::new().into(),
            error: None,
        }
    }

    /// Whether every chunk of the flush was delivered.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

struct QueueItem {
    event: OutboundEvent,
    bytes: usize,
    callback: Option<DeliveryCallback>,
}

struct QueueState {
    items: VecDeque<QueueItem>,
    queued_bytes: usize,
    dedup: Deduplicator,
}

struct Inner {
    config: QueueConfig,
    engine: DeliveryEngine,
    state: Mutex<QueueState>,
    /// Pending-flush gate: a later flush waits here until the in-flight one
    /// settles. Tokio's mutex queues waiters FIFO, which preserves batch
    /// order across flushes.
    flush_gate: Mutex<()>,
    error_handler: StdMutex<Option<ErrorHandler>>,
    idle_timer: StdMutex<Option<JoinHandle<()>>>,
    lifecycle_task: StdMutex<Option<JoinHandle<()>>>,
}

/// The telemetry batching queue.
///
/// Cheap to clone; clones share the same buffer and in-flight state.
#[derive(Clone)]
pub struct TelemetryQueue {
    inner: Arc<Inner>,
}

impl TelemetryQueue {
    /// Create a queue that delivers over HTTP to the configured endpoint.
    pub fn new(config: QueueConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(&config.endpoint, &config.write_key));
        Self::with_transport(config, transport)
    }

    /// Create a queue with an injected transport (embeddings, tests).
    pub fn with_transport(config: QueueConfig, transport: Arc<dyn Transport>) -> Self {
        let config = config.clamped();
        let dedup_window = chrono::Duration::from_std(config.dedup_window)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let engine = DeliveryEngine::new(transport, config.retry_count);

        Self {
            inner: Arc::new(Inner {
                engine,
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    queued_bytes: 0,
                    dedup: Deduplicator::new(dedup_window),
                }),
                flush_gate: Mutex::new(()),
                error_handler: StdMutex::new(None),
                idle_timer: StdMutex::new(None),
                lifecycle_task: StdMutex::new(None),
                config,
            }),
        }
    }

    /// Register a handler invoked once per failed flush. Handler panics are
    /// caught and swallowed so a third-party bug cannot destabilize the
    /// host.
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        *self.inner.error_handler.lock().expect("lock poisoned") = Some(handler);
    }

    /// Enqueue an event, fire-and-forget.
    ///
    /// Runs the dedup check, assigns the content hash as the message id,
    /// and evaluates the flush triggers. Never waits on network I/O; a
    /// threshold-triggered flush is spawned, not awaited. A suppressed
    /// duplicate leaves the queue untouched and its callback unresolved.
    pub async fn enqueue(&self, record: EventRecord, callback: Option<DeliveryCallback>) {
        let hash = content_hash(&record);
        let timestamp = record.original_timestamp;

        let threshold_hit = {
            let mut state = self.inner.state.lock().await;

            if state.dedup.check(&hash, timestamp) {
                return;
            }

            let event = OutboundEvent {
                record,
                message_id: hash,
                sent_at: None,
            };
            let bytes = match serde_json::to_vec(&event) {
                Ok(serialized) => serialized.len(),
                Err(e) => {
                    error!(error = %e, "Dropping unserializable event");
                    return;
                }
            };

            let old_len = state.items.len();
            let old_bytes = state.queued_bytes;
            state.queued_bytes += bytes;
            state.items.push_back(QueueItem {
                event,
                bytes,
                callback,
            });

            debug!(
                pending = state.items.len(),
                queued_bytes = state.queued_bytes,
                "Enqueued event"
            );

            // Trigger on the crossing, not on every enqueue above the
            // threshold, so one burst schedules exactly one flush. Any
            // backlog left above the threshold is rechecked when that
            // flush drains.
            (old_len < self.inner.config.flush_at
                && state.items.len() >= self.inner.config.flush_at)
                || (old_bytes < self.inner.config.max_queue_bytes
                    && state.queued_bytes >= self.inner.config.max_queue_bytes)
        };

        if threshold_hit {
            self.cancel_idle_timer();
            let queue = self.clone();
            tokio::spawn(async move {
                queue.flush().await;
            });
        } else {
            self.arm_idle_timer();
        }
    }

    /// Flush the head of the queue.
    ///
    /// Resolves immediately on an empty queue; otherwise waits for any
    /// in-flight flush to settle, drains up to `flush_at` items, and
    /// delivers them. Failures come back as part of the outcome, never as
    /// a panic or an unhandled error.
    pub async fn flush(&self) -> FlushOutcome {
        self.flush_inner().await
    }

    // Boxed so the recursive spawn below doesn't cycle the compiler's
    // `Send` inference for the `flush` future.
    fn flush_inner(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = FlushOutcome> + Send + '_>> {
        Box::pin(async move {
        self.cancel_idle_timer();

        if self.inner.state.lock().await.items.is_empty() {
            return FlushOutcome::empty();
        }

        let _gate = self.inner.flush_gate.lock().await;

        let drained: Vec<QueueItem> = {
            let mut state = self.inner.state.lock().await;
            if state.items.is_empty() {
                return FlushOutcome::empty();
            }
            let take = state.items.len().min(self.inner.config.flush_at);
            let drained: Vec<QueueItem> = state.items.drain(..take).collect();
            let freed: usize = drained.iter().map(|i| i.bytes).sum();
            state.queued_bytes = state.queued_bytes.saturating_sub(freed);
            drained
        };

        // One logical send instant for the whole batch.
        let sent_at = Utc::now();
        let mut callbacks = Vec::with_capacity(drained.len());
        let mut events = Vec::with_capacity(drained.len());
        for mut item in drained {
            item.event.sent_at = Some(sent_at);
            callbacks.push(item.callback);
            events.push(item.event);
        }
        let payload: BatchPayload = events.into();

        let result = match partition(&payload, KEEPALIVE_BODY_CEILING) {
            Ok(chunks) => self.inner.engine.send_all(&chunks).await,
            Err(e) => Err(DeliveryError::Serialization(e.to_string())),
        };
        let error = result.err();

        if let Some(e) = &error {
            warn!(events = payload.len(), error = %e, "Flush completed with failure");
            self.invoke_error_handler(e);
        } else {
            debug!(events = payload.len(), "Flush delivered");
        }

        for callback in callbacks.into_iter().flatten() {
            let item_result = match &error {
                Some(e) => Err(e.clone()),
                None => Ok(payload.clone()),
            };
            callback(item_result);
        }

        // Items that accumulated past a threshold while this flush was in
        // flight still need their own flush; anything below the thresholds
        // goes back on the idle timer.
        let (backlog, remaining) = {
            let state = self.inner.state.lock().await;
            let backlog = state.items.len() >= self.inner.config.flush_at
                || state.queued_bytes >= self.inner.config.max_queue_bytes;
            (backlog, state.items.len())
        };
        if backlog {
            let queue = self.clone();
            tokio::spawn(async move {
                queue.flush_inner().await;
            });
        } else if remaining > 0 {
            self.arm_idle_timer();
        }

        FlushOutcome {
            attempted: payload,
            error,
        }
        })
    }

    /// Attach a lifecycle signal source.
    ///
    /// Spawns a listener that collapses redundant leave signals and forces
    /// a flush on terminal (non-accessible) transitions — the last
    /// guaranteed opportunity to send. Replaces any previously attached
    /// source.
    pub fn attach_lifecycle(&self, mut signals: mpsc::Receiver<LifecycleSignal>) {
        let queue = self.clone();
        let trigger = Arc::new(LifecycleTrigger::new());

        let handle = tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                if let Some(leave) = trigger.observe(signal) {
                    if !leave.accessible {
                        queue.flush().await;
                    }
                    // Rearm on the next tick so a genuinely distinct leave
                    // is not suppressed.
                    let trigger = trigger.clone();
                    tokio::spawn(async move {
                        tokio::task::yield_now().await;
                        trigger.rearm();
                    });
                }
            }
        });

        let mut guard = self.inner.lifecycle_task.lock().expect("lock poisoned");
        if let Some(old) = guard.replace(handle) {
            old.abort();
        }
    }

    /// Cancel the idle timer and detach the lifecycle listener.
    ///
    /// Best-effort teardown: does not attempt a final flush.
    pub fn cleanup(&self) {
        self.cancel_idle_timer();
        if let Some(task) = self
            .inner
            .lifecycle_task
            .lock()
            .expect("lock poisoned")
            .take()
        {
            task.abort();
        }
        debug!("Queue cleaned up");
    }

    /// Number of items waiting in the queue.
    pub async fn pending_count(&self) -> usize {
        self.inner.state.lock().await.items.len()
    }

    /// Cumulative serialized size of queued items.
    pub async fn queued_bytes(&self) -> usize {
        self.inner.state.lock().await.queued_bytes
    }

    /// Whether the queue holds no items.
    pub async fn is_empty(&self) -> bool {
        self.pending_count().await == 0
    }

    fn arm_idle_timer(&self) {
        let mut guard = self.inner.idle_timer.lock().expect("lock poisoned");
        if guard.is_some() {
            return;
        }

        let queue = self.clone();
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(queue.inner.config.flush_interval).await;
            queue
                .inner
                .idle_timer
                .lock()
                .expect("lock poisoned")
                .take();
            queue.flush().await;
        }));
    }

    fn cancel_idle_timer(&self) {
        if let Some(timer) = self.inner.idle_timer.lock().expect("lock poisoned").take() {
            timer.abort();
        }
    }

    fn invoke_error_handler(&self, error: &DeliveryError) {
        let guard = self.inner.error_handler.lock().expect("lock poisoned");
        if let Some(handler) = guard.as_ref() {
            if catch_unwind(AssertUnwindSafe(|| handler(error))).is_err() {
                warn!("Error handler panicked; ignoring");
            }
        }
    }
}
