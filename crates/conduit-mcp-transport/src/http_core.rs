//! Shared HTTP plumbing for the remote transports.
//!
//! One pooled `reqwest` client per transport, a default user agent, custom
//! headers, per-request read timeouts, retry with exponential backoff and
//! jitter on transient failures, and OAuth bearer injection with discovery
//! on a first 401.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use conduit_mcp_auth::OAuthSession;
use conduit_mcp_core::protocol::constants::{
    LAST_EVENT_ID_HEADER, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER,
};
use conduit_mcp_core::{McpError, McpResult};

use crate::session::Session;

/// Exponential backoff with ±25% jitter.
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    /// The reconnect policy shared by the streaming transports: base 0.5 s,
    /// cap 30 s.
    pub fn for_reconnect() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }

    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn next_delay(&mut self) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(self.attempt))
            .min(self.cap);
        self.attempt = self.attempt.saturating_add(1);
        let jitter = rand::rng().random_range(0.75..=1.25);
        exp.mul_f64(jitter)
    }
}

/// Embedder hook to customize every outgoing request builder, e.g. for
/// proxies or extra instrumentation headers.
pub type RequestCustomizer =
    Arc<dyn Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync>;

#[derive(Clone, Default)]
pub struct HttpCoreConfig {
    pub headers: Vec<(String, String)>,
    pub read_timeout: Option<Duration>,
    pub max_retries: u32,
    pub oauth: Option<Arc<OAuthSession>>,
    pub customize: Option<RequestCustomizer>,
}

pub struct HttpCore {
    client: reqwest::Client,
    config: HttpCoreConfig,
    // OAuth discovery is attempted once per 401 streak, not per request.
    discovered: AtomicBool,
}

impl HttpCore {
    pub fn new(config: HttpCoreConfig) -> McpResult<Self> {
        // No global timeout: it would also bound long-lived SSE GETs. The
        // per-request read timeout is applied to POSTs only.
        let client = reqwest::Client::builder()
            .user_agent(format!("mcp-client/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| McpError::connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            discovered: AtomicBool::new(false),
        })
    }

    pub fn oauth(&self) -> Option<&Arc<OAuthSession>> {
        self.config.oauth.as_ref()
    }

    async fn apply_common(
        &self,
        mut builder: reqwest::RequestBuilder,
        session: &Session,
    ) -> McpResult<reqwest::RequestBuilder> {
        for (name, value) in &self.config.headers {
            builder = builder.header(name, value);
        }
        if let Some(version) = session.protocol_version() {
            builder = builder.header(PROTOCOL_VERSION_HEADER, version.to_string());
        }
        if let Some(session_id) = session.session_id() {
            builder = builder.header(SESSION_ID_HEADER, session_id);
        }
        if let Some(oauth) = &self.config.oauth {
            if let Some(token) = oauth.access_token().await? {
                builder = builder.header("Authorization", format!("Bearer {token}"));
            }
        }
        if let Some(customize) = &self.config.customize {
            builder = (**customize)(builder);
        }
        Ok(builder)
    }

    /// POST a JSON-RPC payload, retrying transient failures.
    pub async fn post_json(
        &self,
        url: &url::Url,
        body: &serde_json::Value,
        session: &Session,
    ) -> McpResult<reqwest::Response> {
        self.execute(session, || {
            let mut builder = self
                .client
                .post(url.clone())
                .header("Content-Type", "application/json")
                .header("Accept", "text/event-stream, application/json")
                .json(body);
            if let Some(timeout) = self.config.read_timeout {
                builder = builder.timeout(timeout);
            }
            builder
        })
        .await
    }

    /// Open an SSE GET stream, replaying `Last-Event-ID` when one is known.
    pub async fn get_sse(&self, url: &url::Url, session: &Session) -> McpResult<reqwest::Response> {
        self.execute(session, || {
            let mut builder = self
                .client
                .get(url.clone())
                .header("Accept", "text/event-stream")
                .header("Cache-Control", "no-cache");
            if let Some(event_id) = session.last_event_id() {
                builder = builder.header(LAST_EVENT_ID_HEADER, event_id);
            }
            builder
        })
        .await
    }

    async fn execute(
        &self,
        session: &Session,
        make: impl Fn() -> reqwest::RequestBuilder,
    ) -> McpResult<reqwest::Response> {
        let mut backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(10));
        let mut attempt: u32 = 0;
        let mut retried_auth = false;

        loop {
            let builder = self.apply_common(make(), session).await?;
            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        self.discovered.store(false, Ordering::Relaxed);
                        if let Some(session_id) = response
                            .headers()
                            .get(SESSION_ID_HEADER)
                            .and_then(|v| v.to_str().ok())
                        {
                            session.set_session_id(session_id);
                        }
                        return Ok(response);
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED && !retried_auth {
                        if let Some(oauth) = &self.config.oauth {
                            if !self.discovered.swap(true, Ordering::Relaxed) {
                                let challenge = response
                                    .headers()
                                    .get("www-authenticate")
                                    .and_then(|v| v.to_str().ok())
                                    .map(str::to_string);
                                debug!("401 received, running OAuth discovery");
                                oauth.handle_unauthorized(challenge.as_deref()).await?;
                            }
                            retried_auth = true;
                            continue;
                        }
                    }

                    if status.is_server_error() && attempt < self.config.max_retries {
                        attempt += 1;
                        let delay = backoff.next_delay();
                        warn!(%status, attempt, ?delay, "transient HTTP failure, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(McpError::connection(format!("HTTP {status}: {body}")));
                }
                Err(err) if (err.is_connect() || err.is_timeout()) => {
                    if attempt < self.config.max_retries {
                        attempt += 1;
                        let delay = backoff.next_delay();
                        warn!(error = %err, attempt, ?delay, "connection failure, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(McpError::connection(format!("HTTP request failed: {err}")));
                }
                Err(err) => {
                    return Err(McpError::connection(format!("HTTP request failed: {err}")));
                }
            }
        }
    }
}
