use crate::protocol::constants::JSONRPC_VERSION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// JSON-RPC 2.0 request ID can be string or number.
///
/// Outbound requests always use numeric IDs from the session's monotonic
/// allocator; the string form exists because servers are free to pick either
/// for their own requests and we must echo them back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// JSON-RPC 2.0 request. A notification is a request without an `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response carrying exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            result: Some(result),
            error: None,
            id: Some(id.into()),
        }
    }

    pub fn error(error: JsonRpcError, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }
}

/// A decoded JSON-RPC message, classified by key presence:
/// `method` + `id` is a request, `method` without `id` is a notification,
/// `id` without `method` is a response.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcRequest),
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// Classify a raw JSON object into a message.
    ///
    /// Serde's untagged representation cannot tell a notification from a
    /// request reliably (both deserialize as `JsonRpcRequest`), so the
    /// dispatch rule is applied to the raw object here.
    pub fn classify(value: Value) -> Result<Self, crate::error::McpError> {
        let obj = value
            .as_object()
            .ok_or_else(|| crate::error::McpError::transport("JSON-RPC message is not an object"))?;
        let has_method = obj.contains_key("method");
        let has_id = obj.get("id").map(|v| !v.is_null()).unwrap_or(false);

        match (has_method, has_id) {
            (true, true) => Ok(Self::Request(serde_json::from_value(value)?)),
            (true, false) => Ok(Self::Notification(serde_json::from_value(value)?)),
            (false, true) => {
                let response: JsonRpcResponse = serde_json::from_value(value)?;
                if response.result.is_some() == response.error.is_some() {
                    return Err(crate::error::McpError::transport(
                        "response must carry exactly one of result or error",
                    ));
                }
                Ok(Self::Response(response))
            }
            (false, false) => Err(crate::error::McpError::transport(
                "message has neither method nor id",
            )),
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            JsonRpcMessage::Request(r) | JsonRpcMessage::Notification(r) => serde_json::to_value(r),
            JsonRpcMessage::Response(r) => serde_json::to_value(r),
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(r) | JsonRpcMessage::Notification(r) => Some(&r.method),
            JsonRpcMessage::Response(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_request() {
        let msg = JsonRpcMessage::classify(json!({
            "jsonrpc": "2.0", "id": 7, "method": "ping"
        }))
        .unwrap();
        match msg {
            JsonRpcMessage::Request(r) => {
                assert_eq!(r.method, "ping");
                assert_eq!(r.id, Some(RequestId::Number(7)));
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn classify_notification() {
        let msg = JsonRpcMessage::classify(json!({
            "jsonrpc": "2.0", "method": "notifications/tools/list_changed"
        }))
        .unwrap();
        assert!(matches!(msg, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn classify_response_by_id_without_method() {
        let msg = JsonRpcMessage::classify(json!({
            "jsonrpc": "2.0", "id": 3, "result": {"tools": []}
        }))
        .unwrap();
        assert!(matches!(msg, JsonRpcMessage::Response(_)));
    }

    #[test]
    fn response_with_both_result_and_error_is_rejected() {
        let err = JsonRpcMessage::classify(json!({
            "jsonrpc": "2.0", "id": 3, "result": {}, "error": {"code": -1, "message": "x"}
        }));
        assert!(err.is_err());

        let err = JsonRpcMessage::classify(json!({"jsonrpc": "2.0", "id": 3}));
        assert!(err.is_err());
    }

    #[test]
    fn notification_serializes_without_id() {
        let note = JsonRpcRequest::notification("notifications/initialized", None);
        let value = serde_json::to_value(&note).unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("params").is_none());
        assert_eq!(value["jsonrpc"], "2.0");
    }

    #[test]
    fn string_and_number_ids_round_trip() {
        for id in [json!(42), json!("abc-1")] {
            let parsed: RequestId = serde_json::from_value(id.clone()).unwrap();
            assert_eq!(serde_json::to_value(&parsed).unwrap(), id);
        }
    }
}
