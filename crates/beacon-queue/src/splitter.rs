//! Transport splitter: partitions a batch into wire-safe chunks.
//!
//! Keepalive-style transports enforce a small cumulative body-size ceiling
//! across in-flight requests; exceeding it cancels the request silently. The
//! splitter guarantees every emitted chunk fits under the ceiling, except
//! for a single event whose serialized size alone exceeds it — that event is
//! isolated into its own chunk marked not keepalive-safe and sent as an
//! ordinary request instead of being dropped.

use crate::OutboundEvent;
use beacon_transport::Chunk;
use tracing::warn;

/// Cumulative body-size ceiling for keepalive-safe requests, in UTF-8 bytes.
pub const KEEPALIVE_BODY_CEILING: usize = 64 * 1024;

/// Partition a batch into ordered chunks whose JSON-array bodies respect the
/// byte ceiling.
///
/// Byte lengths are measured on the UTF-8 encoding; non-ASCII payload
/// content can be several times larger in bytes than in characters.
pub fn partition(
    events: &[OutboundEvent],
    ceiling: usize,
) -> Result<Vec<Chunk>, serde_json::Error> {
    if events.is_empty() {
        return Ok(Vec::new());
    }

    // Fast path: the whole batch fits in one keepalive-safe request.
    let whole = serde_json::to_vec(events)?;
    if whole.len() <= ceiling {
        return Ok(vec![Chunk {
            body: whole,
            event_count: events.len(),
            keepalive_safe: true,
        }]);
    }

    let mut chunks = Vec::new();
    let mut current: Vec<Vec<u8>> = Vec::new();
    // Running body length including array punctuation: brackets plus one
    // comma per item after the first.
    let mut current_len = 2;

    for event in events {
        let serialized = serde_json::to_vec(event)?;

        if serialized.len() + 2 > ceiling {
            // This one event cannot fit under the ceiling even alone. Ship
            // it as an ordinary (non-keepalive) request; it may be lost if
            // the host terminates mid-flight, which beats dropping it.
            if !current.is_empty() {
                chunks.push(assemble(&current, true));
                current = Vec::new();
                current_len = 2;
            }
            warn!(
                message_id = %event.message_id,
                bytes = serialized.len(),
                ceiling = ceiling,
                "Event exceeds keepalive ceiling, falling back to ordinary request"
            );
            chunks.push(assemble(std::slice::from_ref(&serialized), false));
            continue;
        }

        let comma = usize::from(!current.is_empty());
        if current_len + comma + serialized.len() > ceiling {
            chunks.push(assemble(&current, true));
            current = Vec::new();
            current_len = 2;
        }

        current_len += usize::from(!current.is_empty()) + serialized.len();
        current.push(serialized);
    }

    if !current.is_empty() {
        chunks.push(assemble(&current, true));
    }

    Ok(chunks)
}

fn assemble(items: &[Vec<u8>], keepalive_safe: bool) -> Chunk {
    let punctuation = 2 + items.len().saturating_sub(1);
    let mut body = Vec::with_capacity(items.iter().map(Vec::len).sum::<usize>() + punctuation);
    body.push(b'[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            body.push(b',');
        }
        body.extend_from_slice(item);
    }
    body.push(b']');

    Chunk {
        body,
        event_count: items.len(),
        keepalive_safe,
    }
}
