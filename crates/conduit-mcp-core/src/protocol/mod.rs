//! MCP protocol layer: JSON-RPC message model, version negotiation,
//! capability declarations and the initialize handshake.

pub mod capabilities;
pub mod constants;
pub mod jsonrpc;
pub mod lifecycle;
pub mod version;

pub use capabilities::{ClientCapabilities, ServerCapabilities};
pub use jsonrpc::{JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use lifecycle::{ClientInfo, InitializeRequest, InitializeResponse, ServerInfo};
pub use version::ProtocolVersion;
