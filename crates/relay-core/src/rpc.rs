//! JSON-RPC 2.0 envelope types shared by the client and server paths.

use serde::{Deserialize, Serialize};

/// Protocol version carried in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method name of the progress side-channel notification.
pub const PROGRESS_METHOD: &str = "notifications/progress";

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Server-defined code used for gate and auth rejections.
pub const REQUEST_REJECTED: i64 = -32000;

/// A JSON-RPC 2.0 message: request, notification, or response.
///
/// One permissive shape covers all three so a streamed frame can be
/// deserialized once and then classified. `jsonrpc` must be `"2.0"` for the
/// message to count as an envelope at all; everything else is optional.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub jsonrpc: String,
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Params of a `notifications/progress` notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNotification {
    pub progress_token: serde_json::Value,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Build a request envelope.
    pub fn request(
        id: serde_json::Value,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    /// Build a successful response envelope.
    pub fn response(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Whether this envelope is a progress notification.
    pub fn is_progress(&self) -> bool {
        self.method.as_deref() == Some(PROGRESS_METHOD)
    }

    /// Parse the params as a [`ProgressNotification`], if this is one.
    pub fn progress(&self) -> Option<ProgressNotification> {
        if !self.is_progress() {
            return None;
        }
        self.params
            .clone()
            .and_then(|p| serde_json::from_value(p).ok())
    }

    /// Whether this envelope is the response to the request with `id`.
    pub fn matches_id(&self, id: &serde_json::Value) -> bool {
        self.id.as_ref() == Some(id)
    }
}

/// JSON-RPC error response body with an explicit `null` id.
///
/// Used for rejections issued before a request id is known (gate and auth
/// failures).
pub fn error_body(code: i64, message: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "error": { "code": code, "message": message },
        "id": null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_result_envelope() {
        let raw = r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.jsonrpc, "2.0");
        assert!(env.matches_id(&json!(7)));
        assert_eq!(env.result.unwrap()["ok"], true);
        assert!(env.error.is_none());
    }

    #[test]
    fn parse_error_envelope() {
        let raw = r#"{"jsonrpc":"2.0","id":"abc","error":{"code":-32601,"message":"Method not found"}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        let err = env.error.unwrap();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert_eq!(err.message, "Method not found");
    }

    #[test]
    fn parse_notification_without_id() {
        let raw = r#"{"jsonrpc":"2.0","method":"notifications/progress","params":{"progressToken":"t1","progress":0.5}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        assert!(env.is_progress());
        assert!(env.id.is_none());

        let progress = env.progress().unwrap();
        assert_eq!(progress.progress_token, json!("t1"));
        assert!((progress.progress - 0.5).abs() < f64::EPSILON);
        assert!(progress.total.is_none());
    }

    #[test]
    fn progress_with_total_and_message() {
        let env = Envelope {
            jsonrpc: "2.0".into(),
            id: None,
            method: Some(PROGRESS_METHOD.into()),
            params: Some(json!({
                "progressToken": 3,
                "progress": 10.0,
                "total": 20.0,
                "message": "halfway"
            })),
            result: None,
            error: None,
        };
        let progress = env.progress().unwrap();
        assert_eq!(progress.total, Some(20.0));
        assert_eq!(progress.message.as_deref(), Some("halfway"));
    }

    #[test]
    fn non_progress_has_no_progress_params() {
        let env = Envelope::request(json!(1), "tools/call", Some(json!({"name": "echo"})));
        assert!(!env.is_progress());
        assert!(env.progress().is_none());
    }

    #[test]
    fn matches_id_compares_value() {
        let env: Envelope =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"req-1","result":null}"#).unwrap();
        assert!(env.matches_id(&json!("req-1")));
        assert!(!env.matches_id(&json!("req-2")));
        assert!(!env.matches_id(&json!(1)));
    }

    #[test]
    fn request_serializes_with_id() {
        let env = Envelope::request(json!(42), "ping", None);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 42);
        assert_eq!(json["method"], "ping");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn response_serializes_result() {
        let env = Envelope::response(json!("req-1"), json!({"ok": true}));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["id"], "req-1");
        assert_eq!(json["result"]["ok"], true);
        assert!(json.get("method").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn error_body_has_null_id() {
        let body = error_body(REQUEST_REJECTED, "Origin not allowed: https://evil.example");
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["error"]["code"], -32000);
        assert_eq!(body["error"]["message"], "Origin not allowed: https://evil.example");
        assert!(body["id"].is_null());
        assert!(body.get("result").is_none());
    }
}
