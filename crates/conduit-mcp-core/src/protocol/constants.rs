//! Wire-level constants shared across the runtime.

/// JSON-RPC version string used on every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Response header carrying the server-assigned session identifier.
pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Request header replaying the last seen SSE event id on reconnect.
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Negotiated protocol version header on HTTP requests.
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// MCP method names.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";

    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";

    pub const TASKS_GET: &str = "tasks/get";
    pub const TASKS_CANCEL: &str = "tasks/cancel";

    // Server-initiated requests.
    pub const ELICITATION_CREATE: &str = "elicitation/create";
    pub const ROOTS_LIST: &str = "roots/list";
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";

    // Notifications.
    pub const NOTIF_CANCELLED: &str = "notifications/cancelled";
    pub const NOTIF_PROGRESS: &str = "notifications/progress";
    pub const NOTIF_MESSAGE: &str = "notifications/message";
    pub const NOTIF_TOOLS_CHANGED: &str = "notifications/tools/list_changed";
    pub const NOTIF_PROMPTS_CHANGED: &str = "notifications/prompts/list_changed";
    pub const NOTIF_RESOURCES_CHANGED: &str = "notifications/resources/list_changed";
    pub const NOTIF_RESOURCE_UPDATED: &str = "notifications/resources/updated";
    pub const NOTIF_ROOTS_CHANGED: &str = "notifications/roots/list_changed";
}
