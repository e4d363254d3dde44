//! Plain HTTP transport: one POST per JSON-RPC request, whose response body
//! is the single matching JSON-RPC message.
//!
//! There is no server-push channel, so server-initiated requests
//! (elicitation, sampling, roots) can never arrive here. Handler
//! registration on the session is accepted for uniformity but those
//! handlers will not fire on this transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use conduit_mcp_core::{JsonRpcMessage, McpError, McpResult};

use crate::http_core::{HttpCore, HttpCoreConfig};
use crate::session::Session;
use crate::{run_handshake, wire_notify, wire_request, Transport, TransportKind, TransportOptions, Wire};

pub struct HttpTransport {
    url: Url,
    core: HttpCore,
    session: Arc<Session>,
    options: TransportOptions,
}

impl HttpTransport {
    pub fn new(base_url: &str, options: TransportOptions) -> McpResult<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| McpError::connection(format!("invalid HTTP URL '{base_url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(McpError::connection(format!(
                "unsupported scheme for HTTP transport: {}",
                url.scheme()
            )));
        }
        let core = HttpCore::new(HttpCoreConfig {
            headers: options.headers.clone().into_iter().collect(),
            read_timeout: Some(options.read_timeout),
            max_retries: options.max_retries,
            oauth: options.oauth.clone(),
            customize: options.http_customizer.clone(),
        })?;
        let session = Session::new(options.read_timeout);
        Ok(Self {
            url,
            core,
            session,
            options,
        })
    }
}

#[async_trait]
impl Wire for HttpTransport {
    async fn deliver(&self, message: JsonRpcMessage) -> McpResult<()> {
        let is_notification = matches!(message, JsonRpcMessage::Notification(_));
        let body = message.to_value()?;
        let response = self.core.post_json(&self.url, &body, &self.session).await?;

        if is_notification {
            return Ok(());
        }

        // The response body must be exactly one JSON-RPC message; routing it
        // through dispatch resolves the pending slot like any other inbound.
        let value: Value = response
            .json()
            .await
            .map_err(|e| McpError::transport(format!("response body is not JSON: {e}")))?;
        self.session.dispatch(value)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> McpResult<()> {
        if self.session.is_initialized() {
            return Ok(());
        }
        self.session.reset_liveness();
        run_handshake(&self.session, &self.options, self).await
    }

    async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        wire_request(&self.session, self, method, params).await
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        wire_notify(&self.session, self, method, params).await
    }

    async fn cleanup(&self) -> McpResult<()> {
        self.session.fail_all_pending("transport closed");
        Ok(())
    }

    fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
