use crate::types::content::Content;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Behavior hints attached to a tool definition.
///
/// Carries both the legacy booleans (`readOnly`, `destructive`,
/// `requiresConfirmation`) and the 2025-11-25 hint booleans. Hint defaults
/// are applied by the accessor methods and only when the key was absent:
/// a literal `false` coming off the wire is preserved as `Some(false)`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "readOnly", skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,

    #[serde(rename = "destructive", skip_serializing_if = "Option::is_none")]
    pub destructive: Option<bool>,

    #[serde(rename = "requiresConfirmation", skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,

    #[serde(rename = "readOnlyHint", skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,

    #[serde(rename = "destructiveHint", skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,

    #[serde(rename = "idempotentHint", skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,

    #[serde(rename = "openWorldHint", skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,

    /// Any annotation keys this client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ToolAnnotations {
    /// Defaults to `true` when the key is absent.
    pub fn read_only_hint(&self) -> bool {
        self.read_only_hint.unwrap_or(true)
    }

    /// Defaults to `false` when the key is absent.
    pub fn destructive_hint(&self) -> bool {
        self.destructive_hint.unwrap_or(false)
    }

    /// Defaults to `false` when the key is absent.
    pub fn idempotent_hint(&self) -> bool {
        self.idempotent_hint.unwrap_or(false)
    }

    /// Defaults to `true` when the key is absent.
    pub fn open_world_hint(&self) -> bool {
        self.open_world_hint.unwrap_or(true)
    }
}

/// A tool advertised by a server via `tools/list`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Tool {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool arguments. Always emitted as `inputSchema`.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,

    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

// At least one deployed server sends the schema under a bare `schema` key
// instead of the spec's `inputSchema`. Decode accepts both (warning on the
// deviant spelling); encode above emits only `inputSchema`.
#[derive(Deserialize)]
struct ToolWire {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    input_schema: Option<Value>,
    #[serde(default)]
    schema: Option<Value>,
    #[serde(rename = "outputSchema", default)]
    output_schema: Option<Value>,
    #[serde(default)]
    annotations: Option<ToolAnnotations>,
}

impl<'de> Deserialize<'de> for Tool {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = ToolWire::deserialize(deserializer)?;
        let input_schema = match (wire.input_schema, wire.schema) {
            (Some(schema), _) => schema,
            (None, Some(schema)) => {
                tracing::warn!(
                    tool = %wire.name,
                    "tool definition uses deprecated 'schema' key; expected 'inputSchema'"
                );
                schema
            }
            (None, None) => {
                return Err(serde::de::Error::missing_field("inputSchema"));
            }
        };
        Ok(Tool {
            name: wire.name,
            title: wire.title,
            description: wire.description,
            input_schema,
            output_schema: wire.output_schema,
            annotations: wire.annotations,
        })
    }
}

impl Tool {
    pub fn new(name: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            input_schema,
            output_schema: None,
            annotations: None,
        }
    }

    /// Keys listed under `required` in the input schema, if any.
    pub fn required_arguments(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// `tools/call` request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// `tools/call` result.
///
/// Decoded into a typed view while keeping the untouched result object
/// reachable through [`ToolCallResponse::raw`] for forward compatibility
/// with MCP additions this client does not model yet.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolCallResponse {
    #[serde(default)]
    pub content: Vec<Content>,

    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,

    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,

    #[serde(skip)]
    raw: Value,
}

impl ToolCallResponse {
    /// Decode a raw `tools/call` result, retaining the original object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut decoded: Self = serde_json::from_value(value.clone())?;
        decoded.raw = value;
        Ok(decoded)
    }

    /// The untouched result object as received from the server.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// `tools/list` result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResponse {
    pub tools: Vec<Tool>,

    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_accepts_input_schema_key() {
        let tool: Tool = serde_json::from_value(json!({
            "name": "echo",
            "description": "Echo a message",
            "inputSchema": {"type": "object", "properties": {"msg": {"type": "string"}}}
        }))
        .unwrap();
        assert_eq!(tool.name, "echo");
        assert_eq!(tool.input_schema["type"], "object");
    }

    #[test]
    fn decode_accepts_deprecated_schema_key_but_encodes_input_schema() {
        let tool: Tool = serde_json::from_value(json!({
            "name": "legacy",
            "schema": {"type": "object"}
        }))
        .unwrap();
        assert_eq!(tool.input_schema["type"], "object");

        let encoded = serde_json::to_value(&tool).unwrap();
        assert!(encoded.get("inputSchema").is_some());
        assert!(encoded.get("schema").is_none());
    }

    #[test]
    fn decode_without_any_schema_key_fails() {
        let result: Result<Tool, _> = serde_json::from_value(json!({"name": "broken"}));
        assert!(result.is_err());
    }

    #[test]
    fn hint_defaults_apply_only_when_absent() {
        let annotations: ToolAnnotations = serde_json::from_value(json!({})).unwrap();
        assert!(annotations.read_only_hint());
        assert!(!annotations.destructive_hint());
        assert!(!annotations.idempotent_hint());
        assert!(annotations.open_world_hint());

        let annotations: ToolAnnotations = serde_json::from_value(json!({
            "readOnlyHint": false,
            "openWorldHint": false
        }))
        .unwrap();
        assert!(!annotations.read_only_hint());
        assert!(!annotations.open_world_hint());
        // A literal false must survive re-encoding.
        let encoded = serde_json::to_value(&annotations).unwrap();
        assert_eq!(encoded["readOnlyHint"], false);
        assert_eq!(encoded["openWorldHint"], false);
    }

    #[test]
    fn legacy_booleans_are_preserved() {
        let annotations: ToolAnnotations = serde_json::from_value(json!({
            "readOnly": true,
            "requiresConfirmation": true
        }))
        .unwrap();
        assert_eq!(annotations.read_only, Some(true));
        assert_eq!(annotations.requires_confirmation, Some(true));
        // Legacy keys do not affect hint defaults.
        assert!(annotations.read_only_hint());
    }

    #[test]
    fn required_arguments_from_schema() {
        let tool = Tool::new(
            "create",
            json!({"type": "object", "required": ["name", "kind"]}),
        );
        assert_eq!(tool.required_arguments(), vec!["name", "kind"]);
        assert!(Tool::new("free", json!({"type": "object"}))
            .required_arguments()
            .is_empty());
    }

    #[test]
    fn tool_call_response_keeps_raw_value() {
        let value = json!({
            "content": [{"type": "text", "text": "done"}],
            "structuredContent": {"answer": 42},
            "futureField": {"unknown": true}
        });
        let response = ToolCallResponse::from_value(value.clone()).unwrap();
        assert_eq!(response.content.len(), 1);
        assert_eq!(response.structured_content.as_ref().unwrap()["answer"], 42);
        assert!(!response.is_error());
        assert_eq!(response.raw(), &value);
        assert_eq!(response.raw()["futureField"]["unknown"], true);
    }
}
