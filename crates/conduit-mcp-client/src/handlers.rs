//! Routing of server-initiated requests to user-provided handlers, with the
//! outcome coercion the loosely-typed handler surface requires.
//!
//! Handlers run on a spawned task, never directly on the transport reader,
//! but they still must not synchronously call back into the same server's
//! session.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{error, warn};

use conduit_mcp_core::elicitation::validate_content;
use conduit_mcp_core::types::{
    CreateMessageRequest, CreateMessageResponse, Content, ElicitationAction, ElicitationRequest,
    ElicitationResponse, ListRootsResponse, ModelPreferences, Root,
};
use conduit_mcp_core::McpResult;
use conduit_mcp_transport::{ElicitationHandler, RootsListHandler, SamplingHandler};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// User elicitation handler: receives the request and returns a
/// loosely-typed value that is coerced per the rules below.
pub type ElicitationFn =
    Arc<dyn Fn(ElicitationRequest) -> BoxFuture<McpResult<Value>> + Send + Sync>;

/// User sampling handler: receives the request plus normalized model
/// preferences and returns a loosely-typed reply.
pub type SamplingFn = Arc<
    dyn Fn(CreateMessageRequest, ModelPreferences) -> BoxFuture<McpResult<Value>> + Send + Sync,
>;

/// Coerce a handler's return value into an elicitation response:
///
/// - object with a known `action` → taken as-is
/// - object with an unknown `action` → accepted, with a warning
/// - object without `action` → `{action: accept, content: object}`
/// - `null` → `{action: cancel}`
/// - anything else → `{action: accept, content: value}`
pub fn coerce_elicitation_outcome(value: Value) -> ElicitationResponse {
    match value {
        Value::Null => ElicitationResponse::cancel(),
        Value::Object(map) => {
            match map.get("action").and_then(Value::as_str) {
                Some("accept") => ElicitationResponse {
                    action: ElicitationAction::Accept,
                    content: map.get("content").cloned(),
                },
                Some("decline") => ElicitationResponse::decline(),
                Some("cancel") => ElicitationResponse::cancel(),
                Some(other) => {
                    warn!(action = %other, "unknown elicitation action, defaulting to accept");
                    ElicitationResponse {
                        action: ElicitationAction::Accept,
                        content: map.get("content").cloned(),
                    }
                }
                None => ElicitationResponse::accept(Value::Object(map)),
            }
        }
        other => ElicitationResponse::accept(other),
    }
}

/// Coerce a sampling handler's return value into a completion:
///
/// - a bare string becomes a text content block
/// - missing `role`/`model`/`stopReason` default to
///   `assistant`/`unknown`/`endTurn`
pub fn coerce_sampling_reply(value: Value) -> Option<CreateMessageResponse> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(CreateMessageResponse::text(text)),
        Value::Object(map) => {
            let role = map
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("assistant")
                .to_string();
            let model = map
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let stop_reason = map
                .get("stopReason")
                .and_then(Value::as_str)
                .unwrap_or("endTurn")
                .to_string();
            let content = match map.get("content") {
                Some(Value::String(text)) => Content::text(text.clone()),
                Some(raw) => serde_json::from_value(raw.clone()).ok()?,
                None => return None,
            };
            Some(CreateMessageResponse {
                role,
                content,
                model,
                stop_reason: Some(stop_reason),
            })
        }
        _ => None,
    }
}

/// Adapter wiring the user elicitation handler into a session. The slot is
/// shared with the facade so a handler registered after servers were added
/// still takes effect.
pub(crate) struct FacadeElicitation {
    pub handler: Arc<Mutex<Option<ElicitationFn>>>,
}

#[async_trait::async_trait]
impl ElicitationHandler for FacadeElicitation {
    async fn handle(&self, request: ElicitationRequest) -> McpResult<ElicitationResponse> {
        let Some(handler) = self.handler.lock().unwrap().clone() else {
            warn!("server requested elicitation but no handler is configured, declining");
            return Ok(ElicitationResponse::decline());
        };
        let schema = request.requested_schema.clone();
        let form_mode = !request.is_url_mode();

        let outcome = match (*handler)(request).await {
            Ok(value) => coerce_elicitation_outcome(value),
            Err(err) => {
                error!(error = %err, "elicitation handler failed, declining");
                return Ok(ElicitationResponse::decline());
            }
        };

        // The server is authoritative over what it accepts: violations are
        // surfaced in the log but the response still goes out.
        if outcome.action == ElicitationAction::Accept && form_mode {
            if let (Some(schema), Some(content)) = (&schema, &outcome.content) {
                for violation in validate_content(content, schema) {
                    warn!(%violation, "elicitation content does not match the requested schema");
                }
            }
        }

        Ok(outcome)
    }
}

/// Adapter answering `roots/list` from the facade's current roots.
pub(crate) struct FacadeRoots {
    pub roots: Arc<Mutex<Vec<Root>>>,
}

#[async_trait::async_trait]
impl RootsListHandler for FacadeRoots {
    async fn handle(&self) -> McpResult<ListRootsResponse> {
        Ok(ListRootsResponse {
            roots: self.roots.lock().unwrap().clone(),
        })
    }
}

/// Adapter wiring the user sampling handler into a session.
pub(crate) struct FacadeSampling {
    pub handler: Arc<Mutex<Option<SamplingFn>>>,
}

#[async_trait::async_trait]
impl SamplingHandler for FacadeSampling {
    async fn handle(&self, request: CreateMessageRequest) -> McpResult<CreateMessageResponse> {
        let Some(handler) = self.handler.lock().unwrap().clone() else {
            return Err(conduit_mcp_core::McpError::connection(
                "no sampling handler configured",
            ));
        };
        let preferences = request
            .model_preferences
            .as_ref()
            .map(ModelPreferences::normalized)
            .unwrap_or_default();

        let value = (*handler)(request, preferences).await?;
        coerce_sampling_reply(value).ok_or_else(|| {
            conduit_mcp_core::McpError::validation("sampling handler returned no completion")
        })
    }
}
