//! Promotion of framed events to JSON-RPC envelopes and response resolution.

use futures::{Stream, StreamExt};
use metrics::counter;
use serde_json::Value;
use tokio::sync::mpsc;

use relay_core::errors::TransportError;
use relay_core::rpc::{Envelope, JSONRPC_VERSION, ProgressNotification};

use crate::sse::{FramedEvent, Payload};

/// Promote a framed event to a JSON-RPC envelope.
///
/// Only events with no `event` name or the default `message` name qualify,
/// and only JSON payloads declaring `jsonrpc: "2.0"`. Everything else
/// (pings, comments, foreign frames) yields `None` and is skipped by the
/// caller; this one filter is how non-protocol traffic stays out of the RPC
/// path without special cases.
pub fn envelope_from(event: &FramedEvent) -> Option<Envelope> {
    match event.event.as_deref() {
        None | Some("message") => {}
        Some(_) => return None,
    }

    let Payload::Json(value) = event.data.as_ref()? else {
        return None;
    };
    if value.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return None;
    }

    serde_json::from_value(value.clone()).ok()
}

/// Drain a framed-event stream until the response for `id` arrives.
///
/// Progress notifications encountered along the way are forwarded on the
/// optional side-channel; delivery is advisory, so a full or closed channel
/// drops the notification with a debug log. An envelope matching `id` with
/// an `error` object fails the call; one without resolves it. Stream end
/// without a match is [`TransportError::NoResult`].
pub async fn response_for<S>(
    mut events: S,
    id: &Value,
    progress: Option<mpsc::Sender<ProgressNotification>>,
) -> Result<Value, TransportError>
where
    S: Stream<Item = Result<FramedEvent, TransportError>> + Unpin,
{
    while let Some(event) = events.next().await {
        let event = event?;
        let Some(envelope) = envelope_from(&event) else {
            continue;
        };

        if envelope.is_progress() {
            if let (Some(tx), Some(note)) = (progress.as_ref(), envelope.progress()) {
                if let Err(e) = tx.try_send(note) {
                    counter!("relay_progress_drops_total").increment(1);
                    tracing::debug!(error = %e, "progress notification dropped");
                }
            }
            continue;
        }

        if !envelope.matches_id(id) {
            continue;
        }

        if let Some(err) = envelope.error {
            return Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        return Ok(envelope.result.unwrap_or(Value::Null));
    }

    Err(TransportError::NoResult)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
