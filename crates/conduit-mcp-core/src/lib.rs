//! # Conduit MCP Core
//!
//! Protocol and domain layer for the Conduit MCP client runtime.
//!
//! This crate defines everything that is independent of any particular
//! transport:
//!
//! - the JSON-RPC 2.0 message model and inbound dispatch classification
//! - date-coded protocol versions and the initialize handshake types
//! - the catalog primitives (tools, prompts, resources) and the
//!   server-initiated flows (elicitation, sampling, roots)
//! - the elicitation schema/content validator
//! - the [`McpError`] taxonomy shared by every layer
//!
//! Transports live in `conduit-mcp-transport`, OAuth in `conduit-mcp-auth`,
//! and the aggregating client facade in `conduit-mcp-client`.

pub mod elicitation;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{McpError, McpResult};
pub use protocol::{
    ClientCapabilities, ClientInfo, InitializeRequest, InitializeResponse, JsonRpcError,
    JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, ProtocolVersion, RequestId,
    ServerCapabilities, ServerInfo,
};
