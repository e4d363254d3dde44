//! Projections of the tool catalog into vendor function-calling formats.

use serde_json::{json, Map, Value};

use conduit_mcp_core::types::Tool;

/// OpenAI `tools` array entries.
pub fn to_openai_tools(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description.clone().unwrap_or_default(),
                    "parameters": tool.input_schema,
                }
            })
        })
        .collect()
}

/// Anthropic `tools` array entries.
pub fn to_anthropic_tools(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description.clone().unwrap_or_default(),
                "input_schema": tool.input_schema,
            })
        })
        .collect()
}

/// Google (Gemini) `tools` value: one object holding every function
/// declaration. Gemini rejects schemas carrying `$schema`, so the key is
/// stripped recursively.
pub fn to_google_tools(tools: &[Tool]) -> Vec<Value> {
    let declarations: Vec<Value> = tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description.clone().unwrap_or_default(),
                "parameters": strip_schema_key(tool.input_schema.clone()),
            })
        })
        .collect();
    vec![json!({ "function_declarations": declarations })]
}

fn strip_schema_key(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter(|(key, _)| key != "$schema")
                .map(|(key, value)| (key, strip_schema_key(value)))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(strip_schema_key).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tool() -> Tool {
        let mut tool = Tool::new(
            "search",
            json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "properties": {
                    "query": {
                        "$schema": "nested-should-go-too",
                        "type": "string"
                    }
                },
                "required": ["query"]
            }),
        );
        tool.description = Some("Search the index".to_string());
        tool
    }

    #[test]
    fn openai_projection_shape() {
        let projected = to_openai_tools(&[sample_tool()]);
        assert_eq!(projected[0]["type"], "function");
        assert_eq!(projected[0]["function"]["name"], "search");
        assert_eq!(
            projected[0]["function"]["parameters"]["required"],
            json!(["query"])
        );
    }

    #[test]
    fn anthropic_projection_shape() {
        let projected = to_anthropic_tools(&[sample_tool()]);
        assert_eq!(projected[0]["name"], "search");
        assert_eq!(projected[0]["input_schema"]["type"], "object");
    }

    #[test]
    fn google_projection_strips_schema_keys_recursively() {
        let projected = to_google_tools(&[sample_tool()]);
        let declaration = &projected[0]["function_declarations"][0];
        assert_eq!(declaration["name"], "search");
        assert!(declaration["parameters"].get("$schema").is_none());
        assert!(declaration["parameters"]["properties"]["query"]
            .get("$schema")
            .is_none());
        // Everything else survives.
        assert_eq!(
            declaration["parameters"]["properties"]["query"]["type"],
            "string"
        );
    }
}
