//! Elicitation: server-initiated structured input from the end user.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `elicitation/create` parameters as sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitationRequest {
    /// Prompt shown to the user.
    pub message: String,

    /// Flat-object JSON Schema describing the expected content (form mode).
    #[serde(rename = "requestedSchema", skip_serializing_if = "Option::is_none")]
    pub requested_schema: Option<Value>,

    /// `"form"` (default) or `"url"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// URL to open in url mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ElicitationRequest {
    pub fn is_url_mode(&self) -> bool {
        self.mode.as_deref() == Some("url")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElicitationAction {
    Accept,
    Decline,
    Cancel,
}

/// The client's answer to an elicitation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitationResponse {
    pub action: ElicitationAction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl ElicitationResponse {
    pub fn accept(content: Value) -> Self {
        Self {
            action: ElicitationAction::Accept,
            content: Some(content),
        }
    }

    pub fn decline() -> Self {
        Self {
            action: ElicitationAction::Decline,
            content: None,
        }
    }

    pub fn cancel() -> Self {
        Self {
            action: ElicitationAction::Cancel,
            content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_decodes_with_schema() {
        let request: ElicitationRequest = serde_json::from_value(json!({
            "message": "Pick a color",
            "requestedSchema": {
                "type": "object",
                "properties": {"color": {"type": "string", "enum": ["red", "green"]}},
                "required": ["color"]
            }
        }))
        .unwrap();
        assert!(!request.is_url_mode());
        assert!(request.requested_schema.is_some());
    }

    #[test]
    fn actions_serialize_lowercase() {
        let response = ElicitationResponse::accept(json!({"color": "red"}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["action"], "accept");
        assert_eq!(value["content"]["color"], "red");

        let cancel = serde_json::to_value(ElicitationResponse::cancel()).unwrap();
        assert_eq!(cancel, json!({"action": "cancel"}));
    }
}
