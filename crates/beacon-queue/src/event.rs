//! Event model and content hashing.
//!
//! `EventRecord` is produced fully formed by the enrichment layer; the queue
//! never mutates it. `OutboundEvent` is the wire shape: the record plus a
//! deterministic `message_id` (content hash) and a batch-shared `sent_at`
//! stamp added at flush time.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Base64 engine for rendering content hashes as message ids.
const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Event type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Track,
    Page,
    Identify,
    Transaction,
}

/// An enriched, immutable telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event type discriminator.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Caller-supplied event properties.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Device/browser/session context supplied by the enrichment layer.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// When the event originally occurred.
    pub original_timestamp: DateTime<Utc>,
    /// Anonymous identity assigned by the SDK.
    pub anonymous_id: String,
    /// Known user identity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Wallet address associated with the event, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl EventRecord {
    /// Create a bare record; enrichment fills the maps before handing the
    /// record to the queue.
    pub fn new(kind: EventKind, anonymous_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            properties: Map::new(),
            context: Map::new(),
            original_timestamp: timestamp,
            anonymous_id: anonymous_id.into(),
            user_id: None,
            address: None,
        }
    }
}

/// A record ready for the wire: original fields plus `message_id` and, once
/// the batch it belongs to is flushed, a shared `sent_at` stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    #[serde(flatten)]
    pub record: EventRecord,
    /// Content hash; doubles as an idempotency key for server-side dedup.
    pub message_id: String,
    /// Logical send instant, shared by every event in one batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

/// Compute the content hash of a record.
///
/// The timestamp is quantized to whole seconds before hashing, so
/// near-simultaneous duplicate submissions (the classic double-submit race)
/// collapse to the same hash even when their wall clocks differ by
/// milliseconds. Map fields hash deterministically because `serde_json`'s
/// default map is ordered by key.
pub fn content_hash(record: &EventRecord) -> String {
    let mut hasher = Sha256::new();

    hasher.update(kind_tag(record.kind));
    hasher.update([0]);
    hasher.update(record.anonymous_id.as_bytes());
    hasher.update([0]);
    if let Some(user_id) = &record.user_id {
        hasher.update(user_id.as_bytes());
    }
    hasher.update([0]);
    if let Some(address) = &record.address {
        hasher.update(address.as_bytes());
    }
    hasher.update([0]);
    hasher.update(Value::Object(record.properties.clone()).to_string().as_bytes());
    hasher.update([0]);
    hasher.update(Value::Object(record.context.clone()).to_string().as_bytes());
    hasher.update([0]);
    hasher.update(record.original_timestamp.timestamp().to_be_bytes());

    BASE64.encode(hasher.finalize())
}

fn kind_tag(kind: EventKind) -> &'static [u8] {
    match kind {
        EventKind::Track => b"track",
        EventKind::Page => b"page",
        EventKind::Identify => b"identify",
        EventKind::Transaction => b"transaction",
    }
}
