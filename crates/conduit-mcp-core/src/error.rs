//! Error taxonomy for the Conduit MCP client runtime.
//!
//! Every layer of the runtime surfaces errors through [`McpError`]:
//! transports raise `ConnectionError`/`TransportError`, the session layer
//! raises `ServerError` for JSON-RPC error responses, and the client facade
//! adds lookup, ambiguity and per-operation wrappers annotated with the
//! originating server name.

use serde_json::Value;
use thiserror::Error;

/// Canonical result type for all MCP operations.
pub type McpResult<T> = Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("tool '{name}' not found")]
    ToolNotFound { name: String },

    #[error("prompt '{name}' not found")]
    PromptNotFound { name: String },

    #[error("resource '{uri}' not found")]
    ResourceNotFound { uri: String },

    #[error("server '{name}' not found")]
    ServerNotFound { name: String },

    #[error("tool call failed on server '{server}': {message}")]
    ToolCallError { server: String, message: String },

    #[error("prompt get failed on server '{server}': {message}")]
    PromptGetError { server: String, message: String },

    #[error("resource read failed on server '{server}': {message}")]
    ResourceReadError { server: String, message: String },

    #[error("connection error: {0}")]
    ConnectionError(String),

    /// A JSON-RPC error object returned by the server, preserved verbatim.
    #[error("server error {code}: {message}")]
    ServerError {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// Framing or parse failure on the wire.
    #[error("transport error: {0}")]
    TransportError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("tool '{name}' is ambiguous, present on servers: {}", candidates.join(", "))]
    AmbiguousToolName {
        name: String,
        candidates: Vec<String>,
    },

    #[error("prompt '{name}' is ambiguous, present on servers: {}", candidates.join(", "))]
    AmbiguousPromptName {
        name: String,
        candidates: Vec<String>,
    },

    #[error("resource '{uri}' is ambiguous, present on servers: {}", candidates.join(", "))]
    AmbiguousResourceUri {
        uri: String,
        candidates: Vec<String>,
    },

    #[error("could not detect a transport for '{target}': {message}")]
    TransportDetectionError { target: String, message: String },

    #[error("task '{id}' not found")]
    TaskNotFound { id: String },

    #[error("task error: {0}")]
    TaskError(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl McpError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// True for the error classes that pass through the facade unwrapped
    /// so callers can handle them deterministically.
    pub fn is_connection_class(&self) -> bool {
        matches!(
            self,
            McpError::ConnectionError(_) | McpError::TransportError(_)
        )
    }
}

impl From<crate::protocol::jsonrpc::JsonRpcError> for McpError {
    fn from(err: crate::protocol::jsonrpc::JsonRpcError) -> Self {
        McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_tool_error_lists_candidates() {
        let err = McpError::AmbiguousToolName {
            name: "foo".to_string(),
            candidates: vec!["alpha".to_string(), "beta".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("foo"));
        assert!(msg.contains("alpha"));
        assert!(msg.contains("beta"));
    }

    #[test]
    fn jsonrpc_error_preserves_code_and_data() {
        let rpc = crate::protocol::jsonrpc::JsonRpcError {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!({"method": "bogus"})),
        };
        match McpError::from(rpc) {
            McpError::ServerError { code, data, .. } => {
                assert_eq!(code, -32601);
                assert_eq!(data.unwrap()["method"], "bogus");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn connection_class_passthrough() {
        assert!(McpError::connection("down").is_connection_class());
        assert!(McpError::transport("bad frame").is_connection_class());
        assert!(!McpError::validation("missing arg").is_connection_class());
    }
}
