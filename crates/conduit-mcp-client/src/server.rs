//! Per-server connection record: the transport handle, negotiated state and
//! the catalog caches.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::{debug, info};

use conduit_mcp_core::protocol::constants::methods;
use conduit_mcp_core::types::notifications::{
    LoggingMessageNotification, ResourceUpdatedNotification,
};
use conduit_mcp_core::types::{
    GetPromptResponse, ListPromptsResponse, ListResourceTemplatesResponse, ListResourcesResponse,
    ListToolsResponse, Prompt, ReadResourceResponse, Resource, ResourceTemplate, Task, Tool,
    ToolCallResponse,
};
use conduit_mcp_core::{McpError, McpResult, ServerCapabilities, ServerInfo};
use conduit_mcp_transport::Transport;

/// A catalog item together with the server it came from. Same-named items
/// on different servers stay distinct through this key.
#[derive(Debug, Clone)]
pub struct Cataloged<T> {
    pub server: String,
    pub item: T,
}

pub struct ServerConnection {
    name: String,
    transport: Box<dyn Transport>,
    tools: Mutex<Option<Vec<Tool>>>,
    prompts: Mutex<Option<Vec<Prompt>>>,
    resources: Mutex<Option<Vec<Resource>>>,
}

impl ServerConnection {
    pub fn new(name: impl Into<String>, transport: Box<dyn Transport>) -> Arc<Self> {
        let connection = Arc::new(Self {
            name: name.into(),
            transport,
            tools: Mutex::new(None),
            prompts: Mutex::new(None),
            resources: Mutex::new(None),
        });
        Self::install_default_listeners(&connection);
        connection
    }

    /// Default notification handling: list_changed invalidations, resource
    /// update logging, and server log forwarding. User listeners are
    /// registered afterwards and therefore run after these.
    fn install_default_listeners(connection: &Arc<Self>) {
        let weak = Arc::downgrade(connection);
        connection
            .transport
            .session()
            .on_notification(Arc::new(move |method, params| {
                let Some(connection) = weak.upgrade() else {
                    return;
                };
                match method {
                    methods::NOTIF_TOOLS_CHANGED => {
                        debug!(server = %connection.name, "tool list changed, clearing cache");
                        connection.tools.lock().unwrap().take();
                    }
                    methods::NOTIF_PROMPTS_CHANGED => {
                        debug!(server = %connection.name, "prompt list changed, clearing cache");
                        connection.prompts.lock().unwrap().take();
                    }
                    methods::NOTIF_RESOURCES_CHANGED => {
                        debug!(server = %connection.name, "resource list changed, clearing cache");
                        connection.resources.lock().unwrap().take();
                    }
                    methods::NOTIF_RESOURCE_UPDATED => {
                        if let Some(update) = params
                            .cloned()
                            .and_then(|p| {
                                serde_json::from_value::<ResourceUpdatedNotification>(p).ok()
                            })
                        {
                            info!(server = %connection.name, uri = %update.uri, "resource updated");
                        }
                    }
                    methods::NOTIF_MESSAGE => {
                        if let Some(log) = params.cloned().and_then(|p| {
                            serde_json::from_value::<LoggingMessageNotification>(p).ok()
                        }) {
                            log.emit();
                        }
                    }
                    _ => {}
                }
            }));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn server_info(&self) -> Option<ServerInfo> {
        self.transport.session().server_info()
    }

    pub fn capabilities(&self) -> Option<ServerCapabilities> {
        self.transport.session().server_capabilities()
    }

    pub async fn connect(&self) -> McpResult<()> {
        self.transport.connect().await
    }

    pub async fn cleanup(&self) -> McpResult<()> {
        self.transport.cleanup().await
    }

    pub fn clear_caches(&self) {
        self.tools.lock().unwrap().take();
        self.prompts.lock().unwrap().take();
        self.resources.lock().unwrap().take();
    }

    // ---- catalog fetches, cached and paginated -------------------------------

    pub async fn tools(&self) -> McpResult<Vec<Tool>> {
        if let Some(cached) = self.tools.lock().unwrap().clone() {
            return Ok(cached);
        }
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.transport.request(methods::TOOLS_LIST, params).await?;
            let page: ListToolsResponse = serde_json::from_value(result)?;
            tools.extend(page.tools);
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        *self.tools.lock().unwrap() = Some(tools.clone());
        Ok(tools)
    }

    pub async fn prompts(&self) -> McpResult<Vec<Prompt>> {
        if let Some(cached) = self.prompts.lock().unwrap().clone() {
            return Ok(cached);
        }
        let mut prompts = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.transport.request(methods::PROMPTS_LIST, params).await?;
            let page: ListPromptsResponse = serde_json::from_value(result)?;
            prompts.extend(page.prompts);
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        *self.prompts.lock().unwrap() = Some(prompts.clone());
        Ok(prompts)
    }

    pub async fn resources(&self) -> McpResult<Vec<Resource>> {
        if let Some(cached) = self.resources.lock().unwrap().clone() {
            return Ok(cached);
        }
        let mut resources = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self
                .transport
                .request(methods::RESOURCES_LIST, params)
                .await?;
            let page: ListResourcesResponse = serde_json::from_value(result)?;
            resources.extend(page.resources);
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        *self.resources.lock().unwrap() = Some(resources.clone());
        Ok(resources)
    }

    /// Resource templates are not cached: servers expose few of them and
    /// there is no dedicated invalidation notification.
    pub async fn resource_templates(&self) -> McpResult<Vec<ResourceTemplate>> {
        let mut templates = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self
                .transport
                .request(methods::RESOURCES_TEMPLATES_LIST, params)
                .await?;
            let page: ListResourceTemplatesResponse = serde_json::from_value(result)?;
            templates.extend(page.resource_templates);
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        Ok(templates)
    }

    // ---- operations ----------------------------------------------------------

    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> McpResult<ToolCallResponse> {
        let mut params = json!({ "name": name });
        if let Some(arguments) = arguments {
            params["arguments"] = arguments;
        }
        let result = self.transport.request(methods::TOOLS_CALL, Some(params)).await?;
        Ok(ToolCallResponse::from_value(result)?)
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> McpResult<GetPromptResponse> {
        let mut params = json!({ "name": name });
        if let Some(arguments) = arguments {
            params["arguments"] = arguments;
        }
        let result = self
            .transport
            .request(methods::PROMPTS_GET, Some(params))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn read_resource(&self, uri: &str) -> McpResult<ReadResourceResponse> {
        let result = self
            .transport
            .request(methods::RESOURCES_READ, Some(json!({ "uri": uri })))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn subscribe_resource(&self, uri: &str) -> McpResult<()> {
        self.transport
            .request(methods::RESOURCES_SUBSCRIBE, Some(json!({ "uri": uri })))
            .await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: &str) -> McpResult<()> {
        self.transport
            .request(methods::RESOURCES_UNSUBSCRIBE, Some(json!({ "uri": uri })))
            .await?;
        Ok(())
    }

    pub async fn ping(&self) -> McpResult<()> {
        self.transport.request(methods::PING, None).await?;
        Ok(())
    }

    pub async fn get_task(&self, task_id: &str) -> McpResult<Task> {
        let result = self
            .transport
            .request(methods::TASKS_GET, Some(json!({ "taskId": task_id })))
            .await
            .map_err(|err| map_task_error(err, task_id))?;
        let task = result.get("task").cloned().unwrap_or(result);
        Ok(serde_json::from_value(task)?)
    }

    pub async fn cancel_task(&self, task_id: &str) -> McpResult<Task> {
        let result = self
            .transport
            .request(methods::TASKS_CANCEL, Some(json!({ "taskId": task_id })))
            .await
            .map_err(|err| map_task_error(err, task_id))?;
        let task = result.get("task").cloned().unwrap_or(result);
        Ok(serde_json::from_value(task)?)
    }
}

fn map_task_error(err: McpError, task_id: &str) -> McpError {
    match err {
        McpError::ServerError { ref message, .. } if message.to_lowercase().contains("not found") => {
            McpError::TaskNotFound {
                id: task_id.to_string(),
            }
        }
        other => other,
    }
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection")
            .field("name", &self.name)
            .field("transport", &self.transport.describe())
            .finish()
    }
}
