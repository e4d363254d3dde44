//! # Conduit MCP Client
//!
//! The aggregating client facade: one [`McpClient`] fans operations out
//! across any number of MCP servers, caches their catalogs, validates tool
//! arguments, routes server-initiated requests (elicitation, roots,
//! sampling) to user-provided handlers, and converts tool catalogs to
//! vendor function-calling formats.
//!
//! ```no_run
//! use conduit_mcp_client::McpClient;
//!
//! # async fn example() -> conduit_mcp_core::McpResult<()> {
//! let client = McpClient::new();
//! client.connect("https://mcp.example.com/mcp").await?;
//! client.connect("python3 demo_server.py").await?;
//!
//! for tool in client.list_tools().await? {
//!     println!("{}: {}", tool.server, tool.item.name);
//! }
//! let result = client.call_tool("get_audio", Some(serde_json::json!({"frequency": 440})), None).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{info, warn};

use conduit_mcp_core::protocol::constants::methods;
use conduit_mcp_core::protocol::capabilities::{
    ElicitationCapability, RootsCapability, SamplingCapability,
};
use conduit_mcp_core::types::{
    GetPromptResponse, Prompt, ReadResourceResponse, Resource, ResourceTemplate, Root, Task, Tool,
    ToolCallResponse,
};
use conduit_mcp_core::{ClientCapabilities, ClientInfo, McpError, McpResult};
use conduit_mcp_transport::{
    create_transport, Transport, TransportConfig, TransportKind, TransportOptions,
};

pub mod config;
pub mod convert;
pub mod detect;
pub mod handlers;
pub mod server;

pub use config::ServerConfig;
pub use convert::{to_anthropic_tools, to_google_tools, to_openai_tools};
pub use detect::{detect, Detected, Target};
pub use handlers::{ElicitationFn, SamplingFn};
pub use server::{Cataloged, ServerConnection};

use handlers::{FacadeElicitation, FacadeRoots, FacadeSampling};

/// How a caller names one server out of many: by name, index, transport
/// kind, or a connection instance obtained from this client.
#[derive(Debug, Clone)]
pub enum ServerSelector<'a> {
    Name(&'a str),
    Index(usize),
    /// Transport-kind qualifier, e.g. "the stdio server". Matching more
    /// than one server is an error naming the candidates.
    Kind(TransportKind),
    /// A specific connection previously returned by [`McpClient::server`].
    Instance(Arc<ServerConnection>),
}

impl<'a> From<&'a str> for ServerSelector<'a> {
    fn from(name: &'a str) -> Self {
        ServerSelector::Name(name)
    }
}

impl From<usize> for ServerSelector<'_> {
    fn from(index: usize) -> Self {
        ServerSelector::Index(index)
    }
}

impl From<TransportKind> for ServerSelector<'_> {
    fn from(kind: TransportKind) -> Self {
        ServerSelector::Kind(kind)
    }
}

impl From<Arc<ServerConnection>> for ServerSelector<'_> {
    fn from(connection: Arc<ServerConnection>) -> Self {
        ServerSelector::Instance(connection)
    }
}

/// Per-server knobs for [`McpClient::add_server_with_options`].
#[derive(Default, Clone)]
pub struct ServerOptions {
    pub headers: HashMap<String, String>,
    pub oauth: Option<Arc<conduit_mcp_auth::OAuthSession>>,
}

type UserListener = Arc<dyn Fn(&str, &str, Option<&Value>) + Send + Sync>;

/// The aggregating MCP client.
pub struct McpClient {
    client_info: ClientInfo,
    servers: tokio::sync::RwLock<Vec<Arc<ServerConnection>>>,
    roots: Arc<Mutex<Vec<Root>>>,
    elicitation: Arc<Mutex<Option<ElicitationFn>>>,
    sampling: Arc<Mutex<Option<SamplingFn>>>,
    listeners: Arc<std::sync::RwLock<Vec<UserListener>>>,
}

impl Default for McpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl McpClient {
    pub fn new() -> Self {
        Self::with_client_info(ClientInfo::default())
    }

    pub fn with_client_info(client_info: ClientInfo) -> Self {
        Self {
            client_info,
            servers: tokio::sync::RwLock::new(Vec::new()),
            roots: Arc::new(Mutex::new(Vec::new())),
            elicitation: Arc::new(Mutex::new(None)),
            sampling: Arc::new(Mutex::new(None)),
            listeners: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    // ---- handler surface -----------------------------------------------------

    /// Register a client-global notification listener. Listeners run after
    /// the built-in cache invalidation, in registration order.
    pub fn on_notification(&self, listener: impl Fn(&str, &str, Option<&Value>) + Send + Sync + 'static) {
        self.listeners.write().unwrap().push(Arc::new(listener));
    }

    /// Register the elicitation handler. Configure before adding servers so
    /// the capability is advertised during their handshake.
    pub fn on_elicitation_request(&self, handler: ElicitationFn) {
        *self.elicitation.lock().unwrap() = Some(handler);
    }

    /// Register the sampling handler. Configure before adding servers so
    /// the capability is advertised during their handshake.
    pub fn on_sampling_request(&self, handler: SamplingFn) {
        *self.sampling.lock().unwrap() = Some(handler);
    }

    // ---- roots ---------------------------------------------------------------

    pub fn roots(&self) -> Vec<Root> {
        self.roots.lock().unwrap().clone()
    }

    /// Replace the roots list and notify every connected server with
    /// exactly one `notifications/roots/list_changed` before returning.
    pub async fn set_roots(&self, roots: Vec<Root>) -> McpResult<()> {
        *self.roots.lock().unwrap() = roots;
        let servers = self.servers.read().await.clone();
        for server in servers {
            if let Err(err) = server
                .transport()
                .notify(methods::NOTIF_ROOTS_CHANGED, None)
                .await
            {
                warn!(server = %server.name(), error = %err, "failed to notify roots change");
            }
        }
        Ok(())
    }

    pub async fn add_root(&self, root: Root) -> McpResult<()> {
        let mut roots = self.roots();
        if !roots.contains(&root) {
            roots.push(root);
            self.set_roots(roots).await?;
        }
        Ok(())
    }

    // ---- server management ---------------------------------------------------

    fn transport_options(&self, server: &ServerOptions) -> TransportOptions {
        let mut capabilities = ClientCapabilities::default();
        if self.elicitation.lock().unwrap().is_some() {
            capabilities.elicitation = Some(ElicitationCapability {});
        }
        if self.sampling.lock().unwrap().is_some() {
            capabilities.sampling = Some(SamplingCapability {});
        }
        if !self.roots.lock().unwrap().is_empty() {
            capabilities.roots = Some(RootsCapability {
                list_changed: Some(true),
            });
        }
        TransportOptions {
            client_info: self.client_info.clone(),
            capabilities,
            headers: server.headers.clone(),
            oauth: server.oauth.clone(),
            ..TransportOptions::default()
        }
    }

    fn wire_handlers(&self, connection: &Arc<ServerConnection>) {
        let session = connection.transport().session();
        session.on_elicitation_request(Arc::new(FacadeElicitation {
            handler: Arc::clone(&self.elicitation),
        }));
        session.on_roots_list_request(Arc::new(FacadeRoots {
            roots: Arc::clone(&self.roots),
        }));
        session.on_sampling_request(Arc::new(FacadeSampling {
            handler: Arc::clone(&self.sampling),
        }));

        let listeners = Arc::clone(&self.listeners);
        let server_name = connection.name().to_string();
        session.on_notification(Arc::new(move |method, params| {
            for listener in listeners.read().unwrap().iter() {
                (**listener)(&server_name, method, params);
            }
        }));
    }

    async fn install(&self, name: String, transport: Box<dyn Transport>) -> McpResult<String> {
        let connection = ServerConnection::new(name.clone(), transport);
        self.wire_handlers(&connection);
        connection.connect().await?;
        info!(server = %name, transport = %connection.transport().kind(), "server connected");
        self.servers.write().await.push(connection);
        Ok(name)
    }

    /// Add a server with an explicit transport configuration.
    pub async fn add_server(&self, name: impl Into<String>, config: TransportConfig) -> McpResult<String> {
        self.add_server_with_options(name, config, ServerOptions::default())
            .await
    }

    pub async fn add_server_with_options(
        &self,
        name: impl Into<String>,
        config: TransportConfig,
        options: ServerOptions,
    ) -> McpResult<String> {
        let name = name.into();
        if self.servers.read().await.iter().any(|s| s.name() == name) {
            return Err(McpError::validation(format!(
                "a server named '{name}' already exists"
            )));
        }
        let transport = create_transport(config, self.transport_options(&options))?;
        self.install(name, transport).await
    }

    /// Add a server from an external configuration record.
    pub async fn add_server_config(&self, config: ServerConfig) -> McpResult<String> {
        let name = match config.name() {
            Some(name) => name.to_string(),
            None => self.generated_name().await,
        };
        let options = ServerOptions {
            headers: config.headers(),
            oauth: None,
        };
        self.add_server_with_options(name, config.into_transport_config(), options)
            .await
    }

    async fn generated_name(&self) -> String {
        let servers = self.servers.read().await;
        let mut index = servers.len() + 1;
        loop {
            let candidate = format!("server-{index}");
            if !servers.iter().any(|s| s.name() == candidate) {
                return candidate;
            }
            index += 1;
        }
    }

    /// Connect to a target with transport auto-detection. Returns the new
    /// server's name.
    pub async fn connect(&self, target: impl Into<Target>) -> McpResult<String> {
        let target = target.into();
        let detected = detect(&target)?;
        let name = self.generated_name().await;
        self.connect_detected(name, detected, ServerOptions::default())
            .await
    }

    /// Connect to several targets, each with auto-detection and a generated
    /// name. Returns the server names in target order.
    pub async fn connect_all(&self, targets: Vec<Target>) -> McpResult<Vec<String>> {
        let mut names = Vec::with_capacity(targets.len());
        for target in targets {
            names.push(self.connect(target).await?);
        }
        Ok(names)
    }

    async fn connect_detected(
        &self,
        name: String,
        detected: Detected,
        options: ServerOptions,
    ) -> McpResult<String> {
        let config = match detected {
            Detected::Stdio { command } => TransportConfig::Stdio {
                command,
                env: HashMap::new(),
            },
            Detected::Sse { url } => TransportConfig::Sse { base_url: url },
            Detected::StreamableHttp { url } => TransportConfig::Streamable { base_url: url },
            Detected::Http { url } => TransportConfig::Http { base_url: url },
            Detected::Probe { url } => {
                return self.probe_and_install(name, url, options).await;
            }
        };
        self.add_server_with_options(name, config, options).await
    }

    /// Ambiguous URL: try streamable HTTP, then SSE, then plain HTTP. The
    /// first transport that completes `initialize` wins; connection-class
    /// failures fall through to the next candidate, anything else surfaces.
    async fn probe_and_install(
        &self,
        name: String,
        url: String,
        options: ServerOptions,
    ) -> McpResult<String> {
        let candidates = [
            TransportConfig::Streamable {
                base_url: url.clone(),
            },
            TransportConfig::Sse {
                base_url: url.clone(),
            },
            TransportConfig::Http {
                base_url: url.clone(),
            },
        ];

        let mut last_error: Option<McpError> = None;
        for config in candidates {
            let transport = create_transport(config, self.transport_options(&options))?;
            let connection = ServerConnection::new(name.clone(), transport);
            self.wire_handlers(&connection);
            match connection.connect().await {
                Ok(()) => {
                    info!(server = %name, transport = %connection.transport().kind(), "probe succeeded");
                    self.servers.write().await.push(connection);
                    return Ok(name);
                }
                Err(err) if err.is_connection_class() => {
                    let _ = connection.cleanup().await;
                    last_error = Some(err);
                }
                Err(err) => {
                    let _ = connection.cleanup().await;
                    return Err(err);
                }
            }
        }

        Err(McpError::TransportDetectionError {
            target: url,
            message: format!(
                "no transport completed initialize (last error: {})",
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ),
        })
    }

    pub async fn server_names(&self) -> Vec<String> {
        self.servers
            .read()
            .await
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub async fn server(&self, selector: ServerSelector<'_>) -> McpResult<Arc<ServerConnection>> {
        let servers = self.servers.read().await;
        match selector {
            ServerSelector::Name(name) => servers
                .iter()
                .find(|s| s.name() == name)
                .cloned()
                .ok_or_else(|| McpError::ServerNotFound {
                    name: name.to_string(),
                }),
            ServerSelector::Index(index) => {
                servers
                    .get(index)
                    .cloned()
                    .ok_or_else(|| McpError::ServerNotFound {
                        name: format!("#{index}"),
                    })
            }
            ServerSelector::Kind(kind) => {
                let mut matching: Vec<Arc<ServerConnection>> = servers
                    .iter()
                    .filter(|s| s.transport().kind() == kind)
                    .cloned()
                    .collect();
                match matching.len() {
                    0 => Err(McpError::ServerNotFound {
                        name: kind.to_string(),
                    }),
                    1 => Ok(matching.remove(0)),
                    _ => {
                        let names: Vec<String> =
                            matching.iter().map(|s| s.name().to_string()).collect();
                        Err(McpError::validation(format!(
                            "selector '{kind}' matches multiple servers: {}",
                            names.join(", ")
                        )))
                    }
                }
            }
            ServerSelector::Instance(connection) => {
                if servers.iter().any(|s| Arc::ptr_eq(s, &connection)) {
                    Ok(connection)
                } else {
                    Err(McpError::ServerNotFound {
                        name: connection.name().to_string(),
                    })
                }
            }
        }
    }

    /// Disconnect every server and clear the set.
    pub async fn cleanup(&self) -> McpResult<()> {
        let servers: Vec<_> = self.servers.write().await.drain(..).collect();
        for server in servers {
            if let Err(err) = server.cleanup().await {
                warn!(server = %server.name(), error = %err, "cleanup failed");
            }
        }
        Ok(())
    }

    // ---- aggregated catalogs -------------------------------------------------

    pub async fn list_tools(&self) -> McpResult<Vec<Cataloged<Tool>>> {
        let servers = self.servers.read().await.clone();
        let mut out: Vec<Cataloged<Tool>> = Vec::new();
        for server in servers {
            match server.tools().await {
                Ok(tools) => out.extend(tools.into_iter().map(|item| Cataloged {
                    server: server.name().to_string(),
                    item,
                })),
                Err(err) => self.tolerate_partial_failure(server.name(), err, out.is_empty())?,
            }
        }
        Ok(out)
    }

    pub async fn list_prompts(&self) -> McpResult<Vec<Cataloged<Prompt>>> {
        let servers = self.servers.read().await.clone();
        let mut out: Vec<Cataloged<Prompt>> = Vec::new();
        for server in servers {
            match server.prompts().await {
                Ok(prompts) => out.extend(prompts.into_iter().map(|item| Cataloged {
                    server: server.name().to_string(),
                    item,
                })),
                Err(err) => self.tolerate_partial_failure(server.name(), err, out.is_empty())?,
            }
        }
        Ok(out)
    }

    pub async fn list_resources(&self) -> McpResult<Vec<Cataloged<Resource>>> {
        let servers = self.servers.read().await.clone();
        let mut out: Vec<Cataloged<Resource>> = Vec::new();
        for server in servers {
            match server.resources().await {
                Ok(resources) => out.extend(resources.into_iter().map(|item| Cataloged {
                    server: server.name().to_string(),
                    item,
                })),
                Err(err) => self.tolerate_partial_failure(server.name(), err, out.is_empty())?,
            }
        }
        Ok(out)
    }

    pub async fn list_resource_templates(&self) -> McpResult<Vec<Cataloged<ResourceTemplate>>> {
        let servers = self.servers.read().await.clone();
        let mut out: Vec<Cataloged<ResourceTemplate>> = Vec::new();
        for server in servers {
            match server.resource_templates().await {
                Ok(templates) => out.extend(templates.into_iter().map(|item| Cataloged {
                    server: server.name().to_string(),
                    item,
                })),
                Err(err) => self.tolerate_partial_failure(server.name(), err, out.is_empty())?,
            }
        }
        Ok(out)
    }

    /// One failing server does not abort an aggregated call once another
    /// server has answered; an authorization failure before any results is
    /// surfaced immediately for a fast re-auth path.
    fn tolerate_partial_failure(
        &self,
        server: &str,
        err: McpError,
        nothing_collected: bool,
    ) -> McpResult<()> {
        if nothing_collected && is_authorization_error(&err) {
            return Err(err);
        }
        warn!(%server, error = %err, "server failed during aggregated call, continuing");
        Ok(())
    }

    // ---- disambiguated operations --------------------------------------------

    /// Call a tool. Without a selector the tool must resolve to exactly one
    /// server; collisions raise [`McpError::AmbiguousToolName`].
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        server: Option<ServerSelector<'_>>,
    ) -> McpResult<ToolCallResponse> {
        let connection = match server {
            Some(selector) => self.server(selector).await?,
            None => {
                let candidates = self.servers_with_tool(name).await?;
                self.expect_single(candidates, || McpError::ToolNotFound {
                    name: name.to_string(),
                })?
            }
        };

        let tool = connection
            .tools()
            .await?
            .into_iter()
            .find(|tool| tool.name == name)
            .ok_or_else(|| McpError::ToolNotFound {
                name: name.to_string(),
            })?;
        validate_required_arguments(&tool, arguments.as_ref())?;

        connection
            .call_tool(name, arguments)
            .await
            .map_err(|err| wrap_operation_error(err, connection.name(), OperationKind::ToolCall))
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<Value>,
        server: Option<ServerSelector<'_>>,
    ) -> McpResult<GetPromptResponse> {
        let connection = match server {
            Some(selector) => self.server(selector).await?,
            None => {
                let candidates = self.servers_with_prompt(name).await?;
                self.expect_single(candidates, || McpError::PromptNotFound {
                    name: name.to_string(),
                })?
            }
        };
        connection
            .get_prompt(name, arguments)
            .await
            .map_err(|err| wrap_operation_error(err, connection.name(), OperationKind::PromptGet))
    }

    pub async fn read_resource(
        &self,
        uri: &str,
        server: Option<ServerSelector<'_>>,
    ) -> McpResult<ReadResourceResponse> {
        let connection = match server {
            Some(selector) => self.server(selector).await?,
            None => {
                let candidates = self.servers_with_resource(uri).await?;
                self.expect_single(candidates, || McpError::ResourceNotFound {
                    uri: uri.to_string(),
                })?
            }
        };
        connection
            .read_resource(uri)
            .await
            .map_err(|err| wrap_operation_error(err, connection.name(), OperationKind::ResourceRead))
    }

    async fn servers_with_tool(&self, name: &str) -> McpResult<Vec<Arc<ServerConnection>>> {
        let servers = self.servers.read().await.clone();
        let mut matching = Vec::new();
        for server in servers {
            match server.tools().await {
                Ok(tools) => {
                    if tools.iter().any(|tool| tool.name == name) {
                        matching.push(server);
                    }
                }
                Err(err) => warn!(server = %server.name(), error = %err, "skipping server during tool lookup"),
            }
        }
        Ok(matching)
    }

    async fn servers_with_prompt(&self, name: &str) -> McpResult<Vec<Arc<ServerConnection>>> {
        let servers = self.servers.read().await.clone();
        let mut matching = Vec::new();
        for server in servers {
            match server.prompts().await {
                Ok(prompts) => {
                    if prompts.iter().any(|prompt| prompt.name == name) {
                        matching.push(server);
                    }
                }
                Err(err) => warn!(server = %server.name(), error = %err, "skipping server during prompt lookup"),
            }
        }
        Ok(matching)
    }

    async fn servers_with_resource(&self, uri: &str) -> McpResult<Vec<Arc<ServerConnection>>> {
        let servers = self.servers.read().await.clone();
        let mut matching = Vec::new();
        for server in servers {
            match server.resources().await {
                Ok(resources) => {
                    if resources.iter().any(|resource| resource.uri == uri) {
                        matching.push(server);
                    }
                }
                Err(err) => warn!(server = %server.name(), error = %err, "skipping server during resource lookup"),
            }
        }
        Ok(matching)
    }

    fn expect_single(
        &self,
        mut candidates: Vec<Arc<ServerConnection>>,
        not_found: impl FnOnce() -> McpError,
    ) -> McpResult<Arc<ServerConnection>> {
        match candidates.len() {
            0 => Err(not_found()),
            1 => Ok(candidates.remove(0)),
            _ => {
                let names: Vec<String> =
                    candidates.iter().map(|s| s.name().to_string()).collect();
                match not_found() {
                    McpError::ToolNotFound { name } => Err(McpError::AmbiguousToolName {
                        name,
                        candidates: names,
                    }),
                    McpError::PromptNotFound { name } => Err(McpError::AmbiguousPromptName {
                        name,
                        candidates: names,
                    }),
                    McpError::ResourceNotFound { uri } => Err(McpError::AmbiguousResourceUri {
                        uri,
                        candidates: names,
                    }),
                    other => Err(other),
                }
            }
        }
    }

    // ---- misc operations -----------------------------------------------------

    /// Ping one server, or all of them when no selector is given.
    pub async fn ping(&self, server: Option<ServerSelector<'_>>) -> McpResult<()> {
        match server {
            Some(selector) => self.server(selector).await?.ping().await,
            None => {
                let servers = self.servers.read().await.clone();
                for server in servers {
                    server.ping().await?;
                }
                Ok(())
            }
        }
    }

    pub async fn get_task(
        &self,
        task_id: &str,
        server: Option<ServerSelector<'_>>,
    ) -> McpResult<Task> {
        self.single_server(server).await?.get_task(task_id).await
    }

    pub async fn cancel_task(
        &self,
        task_id: &str,
        server: Option<ServerSelector<'_>>,
    ) -> McpResult<Task> {
        self.single_server(server).await?.cancel_task(task_id).await
    }

    pub async fn subscribe_resource(
        &self,
        uri: &str,
        server: Option<ServerSelector<'_>>,
    ) -> McpResult<()> {
        self.single_server(server).await?.subscribe_resource(uri).await
    }

    pub async fn unsubscribe_resource(
        &self,
        uri: &str,
        server: Option<ServerSelector<'_>>,
    ) -> McpResult<()> {
        self.single_server(server)
            .await?
            .unsubscribe_resource(uri)
            .await
    }

    async fn single_server(
        &self,
        selector: Option<ServerSelector<'_>>,
    ) -> McpResult<Arc<ServerConnection>> {
        match selector {
            Some(selector) => self.server(selector).await,
            None => {
                let servers = self.servers.read().await;
                match servers.len() {
                    0 => Err(McpError::ServerNotFound {
                        name: "<none configured>".to_string(),
                    }),
                    1 => Ok(servers[0].clone()),
                    _ => Err(McpError::validation(
                        "multiple servers configured, a server selector is required",
                    )),
                }
            }
        }
    }

    // ---- LLM projections -----------------------------------------------------

    pub async fn to_openai_tools(&self) -> McpResult<Vec<Value>> {
        let tools: Vec<Tool> = self.list_tools().await?.into_iter().map(|c| c.item).collect();
        Ok(convert::to_openai_tools(&tools))
    }

    pub async fn to_anthropic_tools(&self) -> McpResult<Vec<Value>> {
        let tools: Vec<Tool> = self.list_tools().await?.into_iter().map(|c| c.item).collect();
        Ok(convert::to_anthropic_tools(&tools))
    }

    pub async fn to_google_tools(&self) -> McpResult<Vec<Value>> {
        let tools: Vec<Tool> = self.list_tools().await?.into_iter().map(|c| c.item).collect();
        Ok(convert::to_google_tools(&tools))
    }
}

/// Check the tool's `required` arguments are all present before dispatch.
fn validate_required_arguments(tool: &Tool, arguments: Option<&Value>) -> McpResult<()> {
    let required = tool.required_arguments();
    if required.is_empty() {
        return Ok(());
    }
    let supplied = arguments.and_then(Value::as_object);
    let missing: Vec<&str> = required
        .into_iter()
        .filter(|key| !supplied.map(|args| args.contains_key(*key)).unwrap_or(false))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(McpError::validation(format!(
            "tool '{}' is missing required arguments: {}",
            tool.name,
            missing.join(", ")
        )))
    }
}

enum OperationKind {
    ToolCall,
    PromptGet,
    ResourceRead,
}

/// Facade error policy: connection-class errors, JSON-RPC server errors and
/// pre-dispatch validation errors pass through unwrapped; anything else is
/// wrapped with the operation and the server identity.
fn wrap_operation_error(err: McpError, server: &str, kind: OperationKind) -> McpError {
    match err {
        McpError::ConnectionError(_)
        | McpError::TransportError(_)
        | McpError::ServerError { .. }
        | McpError::ValidationError(_) => err,
        other => {
            let message = other.to_string();
            let server = server.to_string();
            match kind {
                OperationKind::ToolCall => McpError::ToolCallError { server, message },
                OperationKind::PromptGet => McpError::PromptGetError { server, message },
                OperationKind::ResourceRead => McpError::ResourceReadError { server, message },
            }
        }
    }
}

fn is_authorization_error(err: &McpError) -> bool {
    match err {
        McpError::ConnectionError(message) => {
            let message = message.to_lowercase();
            message.contains("401") || message.contains("unauthorized") || message.contains("authorization")
        }
        _ => false,
    }
}
