//! Initialize handshake messages.
//!
//! A session performs exactly one `initialize` exchange before anything
//! else, then confirms with `notifications/initialized`. Every other method
//! is rejected with a connection error until the confirmation has been sent.

use crate::protocol::capabilities::{ClientCapabilities, ServerCapabilities};
use serde::{Deserialize, Serialize};

/// Identity of the client, sent in `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "conduit-mcp".to_string(),
            title: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Identity of the server, returned from `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    pub capabilities: ClientCapabilities,

    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    /// Protocol version the server selected; the client accepts it as-is.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    pub capabilities: ServerCapabilities,

    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Validate a session identifier received from the `Mcp-Session-Id` header.
///
/// Opaque to the client, but empty strings and control characters are
/// rejected so a corrupt header cannot be echoed back forever.
pub fn validate_session_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c.is_control())
}
