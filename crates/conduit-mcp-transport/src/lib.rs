//! # Conduit MCP Transport
//!
//! Four interchangeable back ends behind one [`Transport`] contract:
//!
//! - [`StdioTransport`]: child process over stdin/stdout, newline-framed
//! - [`SseTransport`]: long-lived SSE GET plus HTTP POST (HTTP+SSE)
//! - [`HttpTransport`]: single-shot HTTP POST per request
//! - [`StreamableHttpTransport`]: HTTP POST whose responses may themselves
//!   be SSE streams, plus a persistent server-push GET
//!
//! Every back end layers the same bidirectional JSON-RPC [`Session`] over
//! its wire: request/response correlation, server-initiated request
//! dispatch, ping/pong, the `initialize` handshake, and reconnect
//! bookkeeping all live there.
//!
//! Handler registration happens on the session
//! (`transport.session().on_elicitation_request(...)` and friends) so every
//! back end participates uniformly. The plain HTTP back end accepts
//! registrations but can never deliver server-initiated requests; those
//! handlers simply never fire there.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use conduit_mcp_core::protocol::constants::methods;
use conduit_mcp_core::{
    ClientCapabilities, ClientInfo, JsonRpcMessage, JsonRpcRequest, McpResult,
};

pub mod http;
pub mod http_core;
pub mod session;
pub mod sse;
pub mod sse_codec;
pub mod stdio;
pub mod stream;
pub mod streamable;

pub use http::HttpTransport;
pub use http_core::{Backoff, HttpCore, HttpCoreConfig, RequestCustomizer};
pub use session::{
    ElicitationHandler, NotificationCallback, RootsListHandler, SamplingHandler, Session,
    DEFAULT_MAX_PING_FAILURES, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_READ_TIMEOUT,
};
pub use sse::SseTransport;
pub use sse_codec::{SseEvent, SseParser};
pub use stdio::StdioTransport;
pub use streamable::StreamableHttpTransport;

/// Which wire a transport speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Sse,
    Http,
    StreamableHttp,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Sse => "sse",
            TransportKind::Http => "http",
            TransportKind::StreamableHttp => "streamable_http",
        };
        f.write_str(name)
    }
}

/// Options shared by every back end.
#[derive(Clone)]
pub struct TransportOptions {
    pub client_info: ClientInfo,
    /// Capabilities to declare at initialize time; the facade fills these
    /// in from its configured handlers and roots.
    pub capabilities: ClientCapabilities,
    /// Extra HTTP headers on every remote request.
    pub headers: HashMap<String, String>,
    pub read_timeout: Duration,
    /// Retry budget for one HTTP request (transient failures only).
    pub max_retries: u32,
    /// Silence interval after which a streaming transport probes with a ping.
    pub ping_interval: Duration,
    pub max_ping_failures: u32,
    pub max_reconnect_attempts: u32,
    pub oauth: Option<Arc<conduit_mcp_auth::OAuthSession>>,
    /// Hook applied to every outgoing HTTP request builder.
    pub http_customizer: Option<http_core::RequestCustomizer>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            client_info: ClientInfo::default(),
            capabilities: ClientCapabilities::default(),
            headers: HashMap::new(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_retries: 3,
            ping_interval: Duration::from_secs(15),
            max_ping_failures: DEFAULT_MAX_PING_FAILURES,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            oauth: None,
            http_customizer: None,
        }
    }
}

impl TransportOptions {
    /// Streams are torn down and reconnected after this much silence.
    pub fn close_after(&self) -> Duration {
        self.ping_interval.mul_f64(2.5)
    }
}

/// The uniform transport contract.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the underlying channel and run the MCP initialize
    /// handshake. Idempotent.
    async fn connect(&self) -> McpResult<()>;

    /// Send a JSON-RPC request and suspend until the matching response
    /// arrives or the read timeout elapses. Safe to call concurrently;
    /// every caller gets a distinct ID and responses are demultiplexed.
    async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value>;

    /// Fire-and-forget notification.
    async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()>;

    /// Close channels, stop background tasks and fail every pending
    /// request with a terminal error. Idempotent.
    async fn cleanup(&self) -> McpResult<()>;

    /// The session, which carries handler registration and negotiated
    /// handshake state.
    fn session(&self) -> &Arc<Session>;

    fn kind(&self) -> TransportKind;

    /// Human-readable endpoint or command line for diagnostics.
    fn describe(&self) -> String;
}

/// How a back end puts one message on its wire. Internal seam shared by the
/// generic request/notify/handshake plumbing below.
#[async_trait]
pub(crate) trait Wire: Send + Sync {
    async fn deliver(&self, message: JsonRpcMessage) -> McpResult<()>;
}

pub(crate) async fn wire_request(
    session: &Arc<Session>,
    wire: &dyn Wire,
    method: &str,
    params: Option<Value>,
) -> McpResult<Value> {
    session.ensure_ready(method)?;
    let (request, id, rx) = session.register_request(method, params);
    if let Err(err) = wire.deliver(JsonRpcMessage::Request(request)).await {
        session.abandon(id);
        return Err(err);
    }
    session.await_response(id, rx).await
}

pub(crate) async fn wire_notify(
    session: &Arc<Session>,
    wire: &dyn Wire,
    method: &str,
    params: Option<Value>,
) -> McpResult<()> {
    session.ensure_ready(method)?;
    wire.deliver(JsonRpcMessage::Notification(JsonRpcRequest::notification(
        method, params,
    )))
    .await
}

/// The single initialize exchange every session performs before anything
/// else: `initialize`, then `notifications/initialized`, then the gate
/// opens.
pub(crate) async fn run_handshake(
    session: &Arc<Session>,
    options: &TransportOptions,
    wire: &dyn Wire,
) -> McpResult<()> {
    let params = session.initialize_params(&options.client_info, &options.capabilities)?;
    let result = wire_request(session, wire, methods::INITIALIZE, Some(params)).await?;
    let response = session.absorb_initialize(result)?;
    tracing::info!(
        server = %response.server_info.name,
        version = %response.protocol_version,
        "MCP session initialized"
    );
    wire_notify(session, wire, methods::INITIALIZED, None).await?;
    session.mark_initialized();
    Ok(())
}

/// Transport configuration records, typically produced by an external
/// config loader.
#[derive(Debug, Clone)]
pub enum TransportConfig {
    Stdio {
        command: Vec<String>,
        env: HashMap<String, String>,
    },
    Sse {
        base_url: String,
    },
    Http {
        base_url: String,
    },
    Streamable {
        base_url: String,
    },
}

/// Build (but do not connect) a transport from its configuration.
pub fn create_transport(
    config: TransportConfig,
    options: TransportOptions,
) -> McpResult<Box<dyn Transport>> {
    match config {
        TransportConfig::Stdio { command, env } => {
            Ok(Box::new(StdioTransport::new(command, env, options)?))
        }
        TransportConfig::Sse { base_url } => Ok(Box::new(SseTransport::new(&base_url, options)?)),
        TransportConfig::Http { base_url } => Ok(Box::new(HttpTransport::new(&base_url, options)?)),
        TransportConfig::Streamable { base_url } => {
            Ok(Box::new(StreamableHttpTransport::new(&base_url, options)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_after_is_two_and_a_half_ping_intervals() {
        let options = TransportOptions {
            ping_interval: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(options.close_after(), Duration::from_secs(25));
    }

    #[test]
    fn transport_kind_display() {
        assert_eq!(TransportKind::StreamableHttp.to_string(), "streamable_http");
        assert_eq!(TransportKind::Stdio.to_string(), "stdio");
    }

    #[test]
    fn factory_builds_each_kind() {
        let stdio = create_transport(
            TransportConfig::Stdio {
                command: vec!["python3".to_string(), "server.py".to_string()],
                env: HashMap::new(),
            },
            TransportOptions::default(),
        )
        .unwrap();
        assert_eq!(stdio.kind(), TransportKind::Stdio);

        let sse = create_transport(
            TransportConfig::Sse {
                base_url: "http://localhost:9000/sse".to_string(),
            },
            TransportOptions::default(),
        )
        .unwrap();
        assert_eq!(sse.kind(), TransportKind::Sse);

        let http = create_transport(
            TransportConfig::Http {
                base_url: "http://localhost:9000/rpc".to_string(),
            },
            TransportOptions::default(),
        )
        .unwrap();
        assert_eq!(http.kind(), TransportKind::Http);

        let streamable = create_transport(
            TransportConfig::Streamable {
                base_url: "http://localhost:9000/mcp".to_string(),
            },
            TransportOptions::default(),
        )
        .unwrap();
        assert_eq!(streamable.kind(), TransportKind::StreamableHttp);
    }
}
