//! # Conduit MCP
//!
//! A client-side runtime for the Model Context Protocol: a multi-transport
//! JSON-RPC engine (stdio child processes, HTTP+SSE, plain HTTP, streamable
//! HTTP), an aggregating multi-server client facade, and an OAuth 2.1 + PKCE
//! client for remote servers.
//!
//! This crate re-exports the workspace members; most applications only need
//! [`McpClient`].
//!
//! ```no_run
//! use conduit_mcp::McpClient;
//!
//! # async fn example() -> conduit_mcp::McpResult<()> {
//! let client = McpClient::new();
//! client.connect("npx -y @modelcontextprotocol/server-everything").await?;
//! let tools = client.list_tools().await?;
//! # Ok(())
//! # }
//! ```

pub use conduit_mcp_core::{
    elicitation, error, protocol, types, ClientCapabilities, ClientInfo, McpError, McpResult,
    ProtocolVersion, ServerCapabilities, ServerInfo,
};

pub use conduit_mcp_transport::{
    create_transport, HttpTransport, Session, SseTransport, StdioTransport,
    StreamableHttpTransport, Transport, TransportConfig, TransportKind, TransportOptions,
};

pub use conduit_mcp_auth::{
    canonicalize_server_url, AuthorizationRequest, MemoryStorage, OAuthConfig, OAuthSession,
    OAuthStorage,
};

pub use conduit_mcp_client::{
    detect, Cataloged, Detected, McpClient, ServerConfig, ServerConnection, ServerOptions,
    ServerSelector, Target,
};
