use crate::types::content::Content;
use serde::{Deserialize, Serialize};

/// A prompt advertised by a server via `prompts/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptArgument {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptRequest {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: Content,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub messages: Vec<PromptMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResponse {
    pub prompts: Vec<Prompt>,

    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_round_trip() {
        let value = json!({
            "name": "summarize",
            "description": "Summarize a document",
            "arguments": [
                {"name": "uri", "required": true},
                {"name": "style"}
            ]
        });
        let prompt: Prompt = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(prompt.arguments.as_ref().unwrap().len(), 2);
        assert_eq!(serde_json::to_value(&prompt).unwrap(), value);
    }

    #[test]
    fn get_prompt_response_decodes_messages() {
        let response: GetPromptResponse = serde_json::from_value(json!({
            "messages": [
                {"role": "user", "content": {"type": "text", "text": "Summarize this"}}
            ]
        }))
        .unwrap();
        assert_eq!(response.messages[0].content.as_text(), Some("Summarize this"));
    }
}
