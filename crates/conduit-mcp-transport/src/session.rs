//! Bidirectional JSON-RPC session shared by every transport back end.
//!
//! The session owns the pending-request table, the monotonic request-ID
//! allocator, the handler registry for server-initiated traffic, and the
//! negotiated handshake state. Transports feed every inbound message into
//! [`Session::dispatch`] from their reader task and drain the session's
//! outbound queue to their wire.
//!
//! The reader never blocks on user code: inbound server requests are spawned
//! onto their own task and their responses are queued outbound. Handlers
//! invoked from the reader context must not synchronously re-enter
//! [`Session`]-backed requests on the same transport; doing so from another
//! task is fine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use conduit_mcp_core::protocol::constants::methods;
use conduit_mcp_core::protocol::lifecycle::validate_session_id;
use conduit_mcp_core::types::{
    CancelledNotification, CreateMessageRequest, CreateMessageResponse, ElicitationRequest,
    ElicitationResponse, ListRootsResponse,
};
use conduit_mcp_core::{
    ClientCapabilities, ClientInfo, InitializeRequest, InitializeResponse, JsonRpcError,
    JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, McpError, McpResult, ProtocolVersion,
    RequestId, ServerCapabilities, ServerInfo,
};

/// Default read timeout for a single request/response round trip.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Default budget of consecutive ping failures before a stream reconnects.
pub const DEFAULT_MAX_PING_FAILURES: u32 = 3;
/// Default budget of stream reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Ordered notification listener.
pub type NotificationCallback = Arc<dyn Fn(&str, Option<&Value>) + Send + Sync>;

/// Handler for server-initiated `elicitation/create`.
#[async_trait::async_trait]
pub trait ElicitationHandler: Send + Sync {
    async fn handle(&self, request: ElicitationRequest) -> McpResult<ElicitationResponse>;
}

/// Handler for server-initiated `roots/list`.
#[async_trait::async_trait]
pub trait RootsListHandler: Send + Sync {
    async fn handle(&self) -> McpResult<ListRootsResponse>;
}

/// Handler for server-initiated `sampling/createMessage`.
#[async_trait::async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn handle(&self, request: CreateMessageRequest) -> McpResult<CreateMessageResponse>;
}

#[derive(Default, Clone)]
struct Handlers {
    notifications: Vec<NotificationCallback>,
    elicitation: Option<Arc<dyn ElicitationHandler>>,
    roots_list: Option<Arc<dyn RootsListHandler>>,
    sampling: Option<Arc<dyn SamplingHandler>>,
}

/// Per-session mutable handshake state, guarded by one mutex.
#[derive(Default)]
struct Negotiated {
    protocol_version: Option<ProtocolVersion>,
    server_info: Option<ServerInfo>,
    server_capabilities: Option<ServerCapabilities>,
    session_id: Option<String>,
    last_event_id: Option<String>,
}

pub struct Session {
    // Weak self-handle so the reader-side dispatch can spawn handler tasks
    // that outlive the current call frame.
    self_ref: std::sync::Weak<Session>,
    pending: Mutex<HashMap<i64, oneshot::Sender<McpResult<Value>>>>,
    next_id: AtomicI64,
    initialized: AtomicBool,
    handlers: Mutex<Handlers>,
    negotiated: Mutex<Negotiated>,
    outbound: Mutex<Option<mpsc::UnboundedSender<JsonRpcMessage>>>,
    read_timeout: Duration,

    // Liveness budgets persist across in-session reconnect cycles and reset
    // only on a fresh connect().
    ping_failures: AtomicU32,
    reconnect_attempts: AtomicU32,
}

impl Session {
    pub fn new(read_timeout: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            initialized: AtomicBool::new(false),
            handlers: Mutex::new(Handlers::default()),
            negotiated: Mutex::new(Negotiated::default()),
            outbound: Mutex::new(None),
            read_timeout,
            ping_failures: AtomicU32::new(0),
            reconnect_attempts: AtomicU32::new(0),
        })
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    // ---- handler registration ------------------------------------------------

    pub fn on_notification(&self, callback: NotificationCallback) {
        self.handlers.lock().unwrap().notifications.push(callback);
    }

    pub fn on_elicitation_request(&self, handler: Arc<dyn ElicitationHandler>) {
        self.handlers.lock().unwrap().elicitation = Some(handler);
    }

    pub fn on_roots_list_request(&self, handler: Arc<dyn RootsListHandler>) {
        self.handlers.lock().unwrap().roots_list = Some(handler);
    }

    pub fn on_sampling_request(&self, handler: Arc<dyn SamplingHandler>) {
        self.handlers.lock().unwrap().sampling = Some(handler);
    }

    // ---- outbound queue ------------------------------------------------------

    /// Install the queue the owning transport drains to its wire. Replaces
    /// any previous queue (reconnect).
    pub fn attach_outbound(&self) -> mpsc::UnboundedReceiver<JsonRpcMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbound.lock().unwrap() = Some(tx);
        rx
    }

    pub fn detach_outbound(&self) {
        *self.outbound.lock().unwrap() = None;
    }

    pub fn queue_outbound(&self, message: JsonRpcMessage) -> McpResult<()> {
        let guard = self.outbound.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx
                .send(message)
                .map_err(|_| McpError::connection("transport writer is gone")),
            None => Err(McpError::connection("transport is not connected")),
        }
    }

    // ---- request lifecycle ---------------------------------------------------

    /// Gate everything except the handshake until `initialize` completed and
    /// `notifications/initialized` went out.
    pub fn ensure_ready(&self, method: &str) -> McpResult<()> {
        if self.initialized.load(Ordering::Acquire)
            || method == methods::INITIALIZE
            || method == methods::INITIALIZED
        {
            Ok(())
        } else {
            Err(McpError::connection(format!(
                "session is not initialized; cannot call '{method}'"
            )))
        }
    }

    /// Allocate the next request ID and register a pending slot.
    pub fn register_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> (JsonRpcRequest, i64, oneshot::Receiver<McpResult<Value>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);
        (JsonRpcRequest::new(method, params, id), id, rx)
    }

    /// Await the response for a registered request, bounded by the session
    /// read timeout. Expiry or caller cancellation removes the slot; a late
    /// response is then dropped on arrival.
    pub async fn await_response(
        &self,
        id: i64,
        rx: oneshot::Receiver<McpResult<Value>>,
    ) -> McpResult<Value> {
        match tokio::time::timeout(self.read_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending.lock().unwrap().remove(&id);
                Err(McpError::connection("request was cancelled"))
            }
            Err(_) => {
                self.pending.lock().unwrap().remove(&id);
                Err(McpError::connection("read timeout"))
            }
        }
    }

    fn resolve(&self, id: i64, result: McpResult<Value>) {
        let slot = self.pending.lock().unwrap().remove(&id);
        match slot {
            // A dropped receiver means the caller went away; drop the result.
            Some(tx) => drop(tx.send(result)),
            None => debug!(id, "dropping response with no pending request"),
        }
    }

    /// Drop a pending slot whose request never made it onto the wire.
    pub fn abandon(&self, id: i64) {
        self.pending.lock().unwrap().remove(&id);
    }

    /// Fail every in-flight request with a terminal error.
    pub fn fail_all_pending(&self, message: &str) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().collect()
        };
        for (_, tx) in drained {
            drop(tx.send(Err(McpError::connection(message))));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    // ---- inbound dispatch ----------------------------------------------------

    /// Dispatch one inbound message. Invoked from the transport's reader
    /// task; never blocks on user handlers.
    pub fn dispatch(&self, raw: Value) -> McpResult<()> {
        match JsonRpcMessage::classify(raw)? {
            JsonRpcMessage::Response(response) => self.dispatch_response(response),
            JsonRpcMessage::Notification(notification) => self.dispatch_notification(notification),
            JsonRpcMessage::Request(request) => self.dispatch_server_request(request),
        }
        Ok(())
    }

    fn dispatch_response(&self, response: JsonRpcResponse) {
        let id = match response.id {
            Some(RequestId::Number(id)) => id,
            Some(RequestId::String(id)) => {
                debug!(%id, "dropping response with non-numeric id");
                return;
            }
            None => {
                debug!("dropping response without id");
                return;
            }
        };
        let result = match response.error {
            Some(error) => Err(error.into()),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        self.resolve(id, result);
    }

    fn dispatch_notification(&self, notification: JsonRpcRequest) {
        // An inbound cancellation kills the matching waiter before the
        // listeners see the notification.
        if notification.method == methods::NOTIF_CANCELLED {
            if let Some(params) = notification.params.clone() {
                if let Ok(cancelled) = serde_json::from_value::<CancelledNotification>(params) {
                    if let RequestId::Number(id) = cancelled.request_id {
                        self.resolve(
                            id,
                            Err(McpError::connection(
                                cancelled
                                    .reason
                                    .unwrap_or_else(|| "request cancelled by server".to_string()),
                            )),
                        );
                    }
                }
            }
        }

        let callbacks = self.handlers.lock().unwrap().notifications.clone();
        for callback in callbacks {
            (*callback)(&notification.method, notification.params.as_ref());
        }
    }

    fn dispatch_server_request(&self, request: JsonRpcRequest) {
        let Some(id) = request.id.clone() else {
            return;
        };

        // Pings are answered inline so keepalive never waits on the caller
        // pool or on user handlers.
        if request.method == methods::PING {
            let reply = JsonRpcResponse::success(serde_json::json!({}), id);
            if let Err(err) = self.queue_outbound(JsonRpcMessage::Response(reply)) {
                warn!(error = %err, "failed to queue ping reply");
            }
            return;
        }

        let Some(session) = self.self_ref.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let reply = session.answer_server_request(&request).await;
            let message = match reply {
                Ok(result) => JsonRpcMessage::Response(JsonRpcResponse::success(result, id)),
                Err(error) => JsonRpcMessage::Response(JsonRpcResponse::error(
                    JsonRpcError::internal_error(error.to_string()),
                    Some(id),
                )),
            };
            if let Err(err) = session.queue_outbound(message) {
                warn!(error = %err, method = %request.method, "failed to queue server-request reply");
            }
        });
    }

    async fn answer_server_request(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        let handlers = self.handlers.lock().unwrap().clone();
        match request.method.as_str() {
            methods::ELICITATION_CREATE => {
                let handler = handlers
                    .elicitation
                    .ok_or_else(|| McpError::connection("no elicitation handler configured"))?;
                let params: ElicitationRequest =
                    serde_json::from_value(request.params.clone().unwrap_or(Value::Null))?;
                let response = handler.handle(params).await?;
                Ok(serde_json::to_value(response)?)
            }
            methods::ROOTS_LIST => {
                let handler = handlers
                    .roots_list
                    .ok_or_else(|| McpError::connection("no roots handler configured"))?;
                let response = handler.handle().await?;
                Ok(serde_json::to_value(response)?)
            }
            methods::SAMPLING_CREATE_MESSAGE => {
                let handler = handlers
                    .sampling
                    .ok_or_else(|| McpError::connection("no sampling handler configured"))?;
                let params: CreateMessageRequest =
                    serde_json::from_value(request.params.clone().unwrap_or(Value::Null))?;
                let response = handler.handle(params).await?;
                Ok(serde_json::to_value(response)?)
            }
            other => {
                debug!(method = %other, "unsupported server request");
                Err(McpError::from(JsonRpcError::method_not_found(other)))
            }
        }
    }

    // ---- handshake state -----------------------------------------------------

    /// Parameters for the `initialize` request.
    pub fn initialize_params(
        &self,
        client_info: &ClientInfo,
        capabilities: &ClientCapabilities,
    ) -> McpResult<Value> {
        // Re-initializing after reconnect keeps the previously negotiated
        // version instead of re-offering the latest.
        let offered = self
            .negotiated
            .lock()
            .unwrap()
            .protocol_version
            .unwrap_or_else(ProtocolVersion::latest);
        Ok(serde_json::to_value(InitializeRequest {
            protocol_version: offered.to_string(),
            capabilities: capabilities.clone(),
            client_info: client_info.clone(),
        })?)
    }

    /// Record the server's `initialize` result.
    pub fn absorb_initialize(&self, result: Value) -> McpResult<InitializeResponse> {
        let response: InitializeResponse = serde_json::from_value(result)?;
        let version = ProtocolVersion::parse(&response.protocol_version)
            .map_err(|e| McpError::connection(format!("bad protocol version: {e}")))?;
        if !version.is_supported() {
            warn!(%version, "server selected a protocol version this client does not know");
        }

        let mut negotiated = self.negotiated.lock().unwrap();
        negotiated.protocol_version = Some(version);
        negotiated.server_info = Some(response.server_info.clone());
        negotiated.server_capabilities = Some(response.capabilities.clone());
        Ok(response)
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.negotiated.lock().unwrap().protocol_version
    }

    pub fn server_info(&self) -> Option<ServerInfo> {
        self.negotiated.lock().unwrap().server_info.clone()
    }

    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.negotiated.lock().unwrap().server_capabilities.clone()
    }

    /// Store a session identifier from an `Mcp-Session-Id` response header.
    /// Invalid identifiers are rejected.
    pub fn set_session_id(&self, id: &str) -> bool {
        if !validate_session_id(id) {
            warn!("rejecting invalid session id from server");
            return false;
        }
        self.negotiated.lock().unwrap().session_id = Some(id.to_string());
        true
    }

    pub fn session_id(&self) -> Option<String> {
        self.negotiated.lock().unwrap().session_id.clone()
    }

    pub fn set_last_event_id(&self, id: &str) {
        self.negotiated.lock().unwrap().last_event_id = Some(id.to_string());
    }

    pub fn last_event_id(&self) -> Option<String> {
        self.negotiated.lock().unwrap().last_event_id.clone()
    }

    // ---- liveness budgets ----------------------------------------------------

    /// Reset on a fresh `connect()`, never on in-session reconnects.
    pub fn reset_liveness(&self) {
        self.ping_failures.store(0, Ordering::Relaxed);
        self.reconnect_attempts.store(0, Ordering::Relaxed);
    }

    pub fn record_ping_failure(&self) -> u32 {
        self.ping_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_ping_success(&self) {
        self.ping_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_reconnect_attempt(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Clear in-flight state when the underlying stream drops. Negotiated
    /// protocol version, session id and catalog caches survive; waiters get
    /// a terminal error.
    pub fn reset_for_reconnect(&self) {
        self.fail_all_pending("connection lost, reconnecting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Arc<Session> {
        Session::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn request_ids_are_monotonic_from_one() {
        let session = session();
        let (req_a, id_a, _rx_a) = session.register_request("tools/list", None);
        let (_req_b, id_b, _rx_b) = session.register_request("tools/list", None);
        assert_eq!(id_a, 1);
        assert_eq!(id_b, 2);
        assert_eq!(req_a.id, Some(RequestId::Number(1)));
    }

    #[tokio::test]
    async fn response_resolves_matching_waiter() {
        let session = session();
        let (_req, id, rx) = session.register_request("tools/list", None);
        session
            .dispatch(json!({"jsonrpc": "2.0", "id": id, "result": {"tools": []}}))
            .unwrap();
        let value = session.await_response(id, rx).await.unwrap();
        assert_eq!(value["tools"], json!([]));
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn error_response_surfaces_server_error() {
        let session = session();
        let (_req, id, rx) = session.register_request("tools/call", None);
        session
            .dispatch(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32602, "message": "bad arguments"}
            }))
            .unwrap();
        match session.await_response(id, rx).await {
            Err(McpError::ServerError { code, .. }) => assert_eq!(code, -32602),
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_response_id_is_dropped() {
        let session = session();
        // Must not panic or create state.
        session
            .dispatch(json!({"jsonrpc": "2.0", "id": 99, "result": {}}))
            .unwrap();
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn read_timeout_removes_the_slot() {
        let session = session();
        let (_req, id, rx) = session.register_request("tools/list", None);
        let err = session.await_response(id, rx).await.unwrap_err();
        assert!(matches!(err, McpError::ConnectionError(ref m) if m.contains("read timeout")));
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn ping_is_answered_inline_with_empty_result() {
        let session = session();
        let mut outbound = session.attach_outbound();
        session
            .dispatch(json!({"jsonrpc": "2.0", "id": 42, "method": "ping"}))
            .unwrap();
        let reply = outbound.recv().await.unwrap();
        let JsonRpcMessage::Response(response) = reply else {
            panic!("expected response");
        };
        assert_eq!(response.id, Some(RequestId::Number(42)));
        assert_eq!(response.result, Some(json!({})));
    }

    #[tokio::test]
    async fn server_request_without_handler_yields_error_response() {
        let session = session();
        let mut outbound = session.attach_outbound();
        session
            .dispatch(json!({
                "jsonrpc": "2.0", "id": 5, "method": "roots/list"
            }))
            .unwrap();
        let JsonRpcMessage::Response(response) = outbound.recv().await.unwrap() else {
            panic!("expected response");
        };
        assert_eq!(response.id, Some(RequestId::Number(5)));
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn roots_handler_is_invoked_off_the_reader() {
        struct FixedRoots;
        #[async_trait::async_trait]
        impl RootsListHandler for FixedRoots {
            async fn handle(&self) -> McpResult<ListRootsResponse> {
                Ok(ListRootsResponse {
                    roots: vec![conduit_mcp_core::types::Root::new("file:///workspace")],
                })
            }
        }

        let session = session();
        session.on_roots_list_request(Arc::new(FixedRoots));
        let mut outbound = session.attach_outbound();
        session
            .dispatch(json!({"jsonrpc": "2.0", "id": 6, "method": "roots/list"}))
            .unwrap();
        let JsonRpcMessage::Response(response) = outbound.recv().await.unwrap() else {
            panic!("expected response");
        };
        let roots = &response.result.unwrap()["roots"];
        assert_eq!(roots[0]["uri"], "file:///workspace");
    }

    #[tokio::test]
    async fn notifications_run_listeners_in_registration_order() {
        let session = session();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            session.on_notification(Arc::new(move |method: &str, _params| {
                order.lock().unwrap().push(format!("{tag}:{method}"));
            }));
        }
        session
            .dispatch(json!({"jsonrpc": "2.0", "method": "notifications/tools/list_changed"}))
            .unwrap();
        let seen = order.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "first:notifications/tools/list_changed",
                "second:notifications/tools/list_changed"
            ]
        );
    }

    #[tokio::test]
    async fn inbound_cancellation_fails_the_waiter() {
        let session = session();
        let (_req, id, rx) = session.register_request("tools/call", None);
        session
            .dispatch(json!({
                "jsonrpc": "2.0",
                "method": "notifications/cancelled",
                "params": {"requestId": id, "reason": "superseded"}
            }))
            .unwrap();
        let err = session.await_response(id, rx).await.unwrap_err();
        assert!(matches!(err, McpError::ConnectionError(ref m) if m.contains("superseded")));
    }

    #[tokio::test]
    async fn uninitialized_session_gates_catalog_calls() {
        let session = session();
        assert!(session.ensure_ready("tools/list").is_err());
        assert!(session.ensure_ready(methods::INITIALIZE).is_ok());
        assert!(session.ensure_ready(methods::INITIALIZED).is_ok());
        session.mark_initialized();
        assert!(session.ensure_ready("tools/list").is_ok());
    }

    #[tokio::test]
    async fn cleanup_fails_every_pending_waiter() {
        let session = session();
        let (_r1, id1, rx1) = session.register_request("tools/list", None);
        let (_r2, id2, rx2) = session.register_request("prompts/list", None);
        session.fail_all_pending("transport closed");
        for (id, rx) in [(id1, rx1), (id2, rx2)] {
            let err = session.await_response(id, rx).await.unwrap_err();
            assert!(matches!(err, McpError::ConnectionError(_)));
        }
    }

    #[tokio::test]
    async fn absorb_initialize_records_negotiated_state() {
        let session = session();
        let response = session
            .absorb_initialize(json!({
                "protocolVersion": "2025-06-18",
                "capabilities": {"tools": {"listChanged": true}},
                "serverInfo": {"name": "demo", "version": "1.0.0"}
            }))
            .unwrap();
        assert_eq!(response.server_info.name, "demo");
        assert_eq!(
            session.protocol_version(),
            Some(ProtocolVersion::V2025_06_18)
        );
        assert!(session.server_capabilities().unwrap().supports_tools());

        // A subsequent initialize (reconnect) offers the negotiated version.
        let params = session
            .initialize_params(&ClientInfo::default(), &ClientCapabilities::default())
            .unwrap();
        assert_eq!(params["protocolVersion"], "2025-06-18");
    }

    #[tokio::test]
    async fn session_id_validation_applies() {
        let session = session();
        assert!(session.set_session_id("sess-1"));
        assert_eq!(session.session_id().as_deref(), Some("sess-1"));
        assert!(!session.set_session_id(""));
        assert!(!session.set_session_id("bad\u{0002}id"));
        // The previous id is untouched by rejected updates.
        assert_eq!(session.session_id().as_deref(), Some("sess-1"));
    }

    #[tokio::test]
    async fn liveness_budgets_persist_across_reconnect_and_reset_on_connect() {
        let session = session();
        assert_eq!(session.record_ping_failure(), 1);
        assert_eq!(session.record_reconnect_attempt(), 1);
        session.reset_for_reconnect();
        assert_eq!(session.record_ping_failure(), 2);
        assert_eq!(session.record_reconnect_attempt(), 2);
        session.reset_liveness();
        assert_eq!(session.record_ping_failure(), 1);
        assert_eq!(session.record_reconnect_attempt(), 1);
    }
}
