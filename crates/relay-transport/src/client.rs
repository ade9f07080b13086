//! HTTP client call path: JSON-RPC over POST, streamed or plain.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::mpsc;

use relay_core::errors::TransportError;
use relay_core::rpc::{Envelope, ProgressNotification};

use crate::extract::response_for;
use crate::sse::framed_events;

/// JSON-RPC client over HTTP.
///
/// Every call advertises `Accept: application/json, text/event-stream` and
/// handles whichever shape the server picks: an event-stream response is
/// reassembled and drained for the matching response, a plain JSON response
/// is taken as the single envelope.
pub struct RpcClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    /// Use a caller-configured client (timeouts, proxies, pools).
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Send `request` and resolve its response.
    ///
    /// `bearer` is attached as an `Authorization: Bearer` header when given.
    /// Progress notifications stream out on `progress` as they arrive.
    pub async fn call(
        &self,
        request: &Envelope,
        bearer: Option<&str>,
        progress: Option<mpsc::Sender<ProgressNotification>>,
    ) -> Result<Value, TransportError> {
        let id = request.id.clone().unwrap_or(Value::Null);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(request);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Rejections carry a JSON-RPC error body; surface it as the error
            if let Ok(envelope) = serde_json::from_str::<Envelope>(&body) {
                if let Some(err) = envelope.error {
                    return Err(TransportError::Rpc {
                        code: err.code,
                        message: err.message,
                    });
                }
            }
            return Err(TransportError::InvalidResponse(format!(
                "HTTP {status}: {body}"
            )));
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        if is_event_stream {
            let events = Box::pin(framed_events(response.bytes_stream()));
            response_for(events, &id, progress).await
        } else {
            let envelope: Envelope = response
                .json()
                .await
                .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
            if let Some(err) = envelope.error {
                return Err(TransportError::Rpc {
                    code: err.code,
                    message: err.message,
                });
            }
            Ok(envelope.result.unwrap_or(Value::Null))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
