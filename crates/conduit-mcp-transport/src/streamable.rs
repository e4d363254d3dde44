//! Streamable HTTP transport: every outbound JSON-RPC message is an HTTP
//! POST, and each POST response selects by `Content-Type` between a single
//! JSON message and an SSE body whose first `message` event answers the
//! POST (subsequent events are progress notifications for that request).
//!
//! A separate persistent GET to the same endpoint carries the server-push
//! stream (pings, server-initiated requests, async notifications) with the
//! same reconnect discipline as the SSE transport. Session identity rides
//! the `Mcp-Session-Id` header captured from the initialize response, and
//! SSE event ids are replayed as `Last-Event-ID` on reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use conduit_mcp_core::{JsonRpcMessage, McpError, McpResult};

use crate::http_core::{Backoff, HttpCore, HttpCoreConfig};
use crate::session::Session;
use crate::sse_codec::SseParser;
use crate::stream::{dispatch_event_data, pump_sse};
use crate::{run_handshake, wire_notify, wire_request, Transport, TransportKind, TransportOptions, Wire};

pub struct StreamableHttpTransport {
    inner: Arc<StreamableInner>,
    options: TransportOptions,
    connected: AtomicBool,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

struct StreamableInner {
    url: Url,
    core: HttpCore,
    session: Arc<Session>,
}

impl StreamableHttpTransport {
    pub fn new(base_url: &str, options: TransportOptions) -> McpResult<Self> {
        let url = Url::parse(base_url).map_err(|e| {
            McpError::connection(format!("invalid streamable HTTP URL '{base_url}': {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(McpError::connection(format!(
                "unsupported scheme for streamable HTTP transport: {}",
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
            inner: Arc::new(StreamableInner { url, core, session }),
            options,
            connected: AtomicBool::new(false),
            tasks: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// The server-push GET stream. A server that does not offer one answers
    /// the first GET with 4xx/405; that is not an error, the transport just
    /// runs without push.
    fn spawn_push_stream_task(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let ping_interval = self.options.ping_interval;
        let close_after = self.options.close_after();
        let max_reconnect_attempts = self.options.max_reconnect_attempts;

        tokio::spawn(async move {
            let mut backoff = Backoff::for_reconnect();
            let mut ever_connected = false;
            loop {
                match inner.core.get_sse(&inner.url, &inner.session).await {
                    Ok(response) => {
                        debug!(url = %inner.url, "server-push stream established");
                        ever_connected = true;
                        backoff.reset();
                        let session = Arc::clone(&inner.session);
                        let dispatch_session = Arc::clone(&inner.session);
                        let end = pump_sse(
                            response,
                            &session,
                            ping_interval,
                            close_after,
                            move |event| {
                                if event.event == "message" {
                                    dispatch_event_data(&dispatch_session, &event.data);
                                }
                            },
                        )
                        .await;
                        warn!(?end, "server-push stream ended");
                    }
                    Err(err) => {
                        if !ever_connected {
                            debug!(error = %err, "server does not offer a push stream");
                            return;
                        }
                        warn!(error = %err, "failed to re-establish server-push stream");
                    }
                }

                let attempt = inner.session.record_reconnect_attempt();
                if attempt > max_reconnect_attempts {
                    warn!(attempt, "push-stream reconnect budget exhausted");
                    inner
                        .session
                        .fail_all_pending("push-stream reconnect budget exhausted");
                    return;
                }
                tokio::time::sleep(backoff.next_delay()).await;
            }
        })
    }
}

impl StreamableInner {
    /// POST one message and route whatever comes back into the session.
    async fn post_and_process(&self, message: &JsonRpcMessage) -> McpResult<()> {
        let body = message.to_value()?;
        let response = self.core.post_json(&self.url, &body, &self.session).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("text/event-stream") {
            // The body is its own SSE stream: the response to this POST plus
            // progress notifications. Consumed off the caller's path so a
            // server that keeps the stream open does not stall the waiter.
            let session = Arc::clone(&self.session);
            tokio::spawn(async move {
                let mut stream = Box::pin(response.bytes_stream());
                let mut parser = SseParser::new();
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(bytes) => {
                            for event in parser.push(&bytes) {
                                if let Some(id) = &event.id {
                                    session.set_last_event_id(id);
                                }
                                if event.event == "message" {
                                    dispatch_event_data(&session, &event.data);
                                }
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "error reading POST response stream");
                            break;
                        }
                    }
                }
            });
            return Ok(());
        }

        if content_type.starts_with("application/json") {
            let value: Value = response
                .json()
                .await
                .map_err(|e| McpError::transport(format!("response body is not JSON: {e}")))?;
            if value.is_object() {
                self.session.dispatch(value)?;
            }
            return Ok(());
        }

        // 202 Accepted with an empty body: nothing to route (notifications
        // and responses we POSTed back to the server).
        Ok(())
    }
}

#[async_trait]
impl Wire for StreamableHttpTransport {
    async fn deliver(&self, message: JsonRpcMessage) -> McpResult<()> {
        self.inner.post_and_process(&message).await
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    async fn connect(&self) -> McpResult<()> {
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }

        self.inner.session.reset_liveness();

        // Replies produced by the reader (pongs, handler responses) go out
        // as POSTs of their own.
        let mut outbound = self.inner.session.attach_outbound();
        let drain_inner = Arc::clone(&self.inner);
        let drain = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                if let Err(err) = drain_inner.post_and_process(&message).await {
                    warn!(error = %err, "failed to POST reader-originated message");
                }
            }
        });
        self.tasks.lock().unwrap().push(drain);

        // The initialize POST captures Mcp-Session-Id from its response
        // headers; only then is the push stream worth opening.
        if let Err(err) = run_handshake(&self.inner.session, &self.options, self).await {
            let _ = self.cleanup().await;
            return Err(err);
        }

        let push = self.spawn_push_stream_task();
        self.tasks.lock().unwrap().push(push);

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
        self.inner.session.fail_all_pending("transport closed");
        Ok(())
    }

    fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    fn kind(&self) -> TransportKind {
        TransportKind::StreamableHttp
    }

    fn describe(&self) -> String {
        self.inner.url.to_string()
    }
}
