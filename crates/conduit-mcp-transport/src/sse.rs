//! HTTP+SSE transport: a long-lived GET stream for inbound traffic and
//! HTTP POSTs to the endpoint the server announces in its first event.
//!
//! The server's first event MUST be an `endpoint` event whose data is the
//! JSON-RPC POST URL (relative URLs are resolved against the SSE URL); no
//! request leaves the client before it arrives. Subsequent `message` events
//! carry responses, notifications and server-initiated requests. A liveness
//! supervisor pings on inactivity and reconnects with exponential backoff
//! and jitter, replaying `Last-Event-ID`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use conduit_mcp_core::{JsonRpcMessage, McpError, McpResult};

use crate::http_core::{Backoff, HttpCore, HttpCoreConfig};
use crate::session::Session;
use crate::stream::{dispatch_event_data, pump_sse};
use crate::{run_handshake, wire_notify, wire_request, Transport, TransportKind, TransportOptions, Wire};

pub struct SseTransport {
    inner: Arc<SseInner>,
    options: TransportOptions,
    connected: AtomicBool,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

struct SseInner {
    sse_url: Url,
    core: HttpCore,
    session: Arc<Session>,
    endpoint_tx: watch::Sender<Option<Url>>,
    endpoint_rx: watch::Receiver<Option<Url>>,
}

impl SseTransport {
    pub fn new(base_url: &str, options: TransportOptions) -> McpResult<Self> {
        let sse_url = Url::parse(base_url)
            .map_err(|e| McpError::connection(format!("invalid SSE URL '{base_url}': {e}")))?;
        if !matches!(sse_url.scheme(), "http" | "https") {
            return Err(McpError::connection(format!(
                "unsupported scheme for SSE transport: {}",
                sse_url.scheme()
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
        let (endpoint_tx, endpoint_rx) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(SseInner {
                sse_url,
                core,
                session,
                endpoint_tx,
                endpoint_rx,
            }),
            options,
            connected: AtomicBool::new(false),
            tasks: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn spawn_stream_task(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let ping_interval = self.options.ping_interval;
        let close_after = self.options.close_after();
        let max_reconnect_attempts = self.options.max_reconnect_attempts;

        tokio::spawn(async move {
            let mut backoff = Backoff::for_reconnect();
            loop {
                match inner.core.get_sse(&inner.sse_url, &inner.session).await {
                    Ok(response) => {
                        debug!(url = %inner.sse_url, "SSE stream established");
                        backoff.reset();
                        let session = Arc::clone(&inner.session);
                        let endpoint_inner = Arc::clone(&inner);
                        let end = pump_sse(
                            response,
                            &session,
                            ping_interval,
                            close_after,
                            move |event| endpoint_inner.handle_event(event),
                        )
                        .await;
                        warn!(?end, "SSE stream ended");
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to establish SSE stream");
                    }
                }

                let attempt = inner.session.record_reconnect_attempt();
                if attempt > max_reconnect_attempts {
                    warn!(attempt, "SSE reconnect budget exhausted, giving up");
                    inner
                        .session
                        .fail_all_pending("SSE reconnect budget exhausted");
                    return;
                }
                inner.session.reset_for_reconnect();
                tokio::time::sleep(backoff.next_delay()).await;
            }
        })
    }

    fn spawn_post_task(&self, mut outbound: tokio::sync::mpsc::UnboundedReceiver<JsonRpcMessage>) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut endpoint_rx = inner.endpoint_rx.clone();
            while let Some(message) = outbound.recv().await {
                // Requests must not leave before the endpoint event arrived.
                let endpoint = match endpoint_rx.wait_for(|e| e.is_some()).await {
                    Ok(value) => match value.clone() {
                        Some(endpoint) => endpoint,
                        None => continue,
                    },
                    Err(_) => return,
                };
                let body = match message.to_value() {
                    Ok(body) => body,
                    Err(err) => {
                        warn!(error = %err, "failed to encode outbound message");
                        continue;
                    }
                };
                match inner.core.post_json(&endpoint, &body, &inner.session).await {
                    Ok(response) => {
                        // Most servers answer the POST with 202; some echo a
                        // JSON-RPC response body directly.
                        let is_json = response
                            .headers()
                            .get(reqwest::header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(|ct| ct.starts_with("application/json"))
                            .unwrap_or(false);
                        if is_json {
                            if let Ok(value) = response.json::<Value>().await {
                                if value.is_object() {
                                    let _ = inner.session.dispatch(value);
                                }
                            }
                        }
                    }
                    Err(err) => warn!(error = %err, "failed to POST message to SSE endpoint"),
                }
            }
        })
    }
}

impl SseInner {
    fn handle_event(&self, event: crate::sse_codec::SseEvent) {
        match event.event.as_str() {
            "endpoint" => {
                let resolved = self.sse_url.join(event.data.trim());
                match resolved {
                    Ok(endpoint) => {
                        info!(%endpoint, "server announced JSON-RPC endpoint");
                        let _ = self.endpoint_tx.send(Some(endpoint));
                    }
                    Err(err) => {
                        warn!(error = %err, data = %event.data, "invalid endpoint event");
                    }
                }
            }
            "message" => dispatch_event_data(&self.session, &event.data),
            "ping" | "heartbeat" => {}
            other => debug!(event = %other, "ignoring unknown SSE event type"),
        }
    }
}

#[async_trait]
impl Wire for SseTransport {
    async fn deliver(&self, message: JsonRpcMessage) -> McpResult<()> {
        self.inner.session.queue_outbound(message)
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn connect(&self) -> McpResult<()> {
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }

        self.inner.session.reset_liveness();
        let outbound = self.inner.session.attach_outbound();
        {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.push(self.spawn_stream_task());
            tasks.push(self.spawn_post_task(outbound));
        }

        // Block until the endpoint event lands; requests are illegal before.
        let mut endpoint_rx = self.inner.endpoint_rx.clone();
        let endpoint_wait = tokio::time::timeout(
            self.options.read_timeout,
            endpoint_rx.wait_for(|e| e.is_some()),
        )
        .await;
        let got_endpoint = matches!(endpoint_wait, Ok(Ok(_)));
        drop(endpoint_wait);
        if !got_endpoint {
            let _ = self.cleanup().await;
            return Err(McpError::connection(
                "server did not announce an endpoint event",
            ));
        }

        if let Err(err) = run_handshake(&self.inner.session, &self.options, self).await {
            let _ = self.cleanup().await;
            return Err(err);
        }
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        wire_request(&self.inner.session, self, method, params).await
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        wire_notify(&self.inner.session, self, method, params).await
    }

    async fn cleanup(&self) -> McpResult<()> {
        self.connected.store(false, Ordering::Release);
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        self.inner.session.detach_outbound();
        let _ = self.inner.endpoint_tx.send(None);
        self.inner.session.fail_all_pending("transport closed");
        Ok(())
    }

    fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    fn describe(&self) -> String {
        self.inner.sse_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        assert!(SseTransport::new("ftp://example.com/sse", TransportOptions::default()).is_err());
        assert!(SseTransport::new("not a url", TransportOptions::default()).is_err());
    }

    #[test]
    fn relative_endpoint_resolution_against_sse_url() {
        let base = Url::parse("https://example.com/v1/sse").unwrap();
        assert_eq!(
            base.join("/messages").unwrap().as_str(),
            "https://example.com/messages"
        );
        assert_eq!(
            base.join("messages").unwrap().as_str(),
            "https://example.com/v1/messages"
        );
        assert_eq!(
            base.join("https://other.example.com/rpc").unwrap().as_str(),
            "https://other.example.com/rpc"
        );
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let transport =
            SseTransport::new("http://localhost:9999/sse", TransportOptions::default()).unwrap();
        transport.cleanup().await.unwrap();
        transport.cleanup().await.unwrap();
    }
}
