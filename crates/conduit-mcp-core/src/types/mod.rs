//! Domain types for the MCP catalog primitives and server-initiated flows.

pub mod content;
pub mod elicitation;
pub mod notifications;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod tasks;
pub mod tools;

pub use content::{AudioContent, Content, ResourceContent, ResourceLink};
pub use elicitation::{ElicitationAction, ElicitationRequest, ElicitationResponse};
pub use notifications::{
    CancelledNotification, LoggingLevel, LoggingMessageNotification, ProgressNotification,
    ResourceUpdatedNotification,
};
pub use prompts::{GetPromptRequest, GetPromptResponse, ListPromptsResponse, Prompt};
pub use resources::{
    ListResourceTemplatesResponse, ListResourcesResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceAnnotations, ResourceTemplate,
};
pub use roots::{ListRootsResponse, Root};
pub use sampling::{
    CreateMessageRequest, CreateMessageResponse, ModelHint, ModelPreferences, SamplingMessage,
};
pub use tasks::{Task, TaskState};
pub use tools::{ListToolsResponse, Tool, ToolAnnotations, ToolCallRequest, ToolCallResponse};
