//! Sampling: server-initiated requests for the host to run its LLM.

use crate::types::content::Content;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingMessage {
    pub role: String,
    pub content: Content,
}

/// A model name hint; anything beyond `name` is discarded during
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelHint {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ModelPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,

    #[serde(rename = "costPriority", skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,

    #[serde(rename = "speedPriority", skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,

    #[serde(
        rename = "intelligencePriority",
        skip_serializing_if = "Option::is_none"
    )]
    pub intelligence_priority: Option<f64>,
}

impl ModelPreferences {
    /// Clamp priority fields into [0, 1] and drop malformed hints.
    ///
    /// Server input is advisory, so out-of-range values are clamped rather
    /// than rejected before the preferences reach the user handler.
    pub fn normalized(raw: &Value) -> Self {
        let clamp = |key: &str| {
            raw.get(key)
                .and_then(Value::as_f64)
                .map(|p| p.clamp(0.0, 1.0))
        };
        let hints = raw.get("hints").and_then(Value::as_array).map(|hints| {
            hints
                .iter()
                .filter_map(|h| h.get("name").and_then(Value::as_str))
                .map(|name| ModelHint {
                    name: name.to_string(),
                })
                .collect()
        });
        Self {
            hints,
            cost_priority: clamp("costPriority"),
            speed_priority: clamp("speedPriority"),
            intelligence_priority: clamp("intelligencePriority"),
        }
    }
}

/// `sampling/createMessage` parameters as sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    pub messages: Vec<SamplingMessage>,

    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<Value>,

    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(rename = "includeContext", skip_serializing_if = "Option::is_none")]
    pub include_context: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(rename = "maxTokens")]
    pub max_tokens: u64,

    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// The host's completion, returned to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageResponse {
    pub role: String,
    pub content: Content,
    pub model: String,

    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl CreateMessageResponse {
    /// Default envelope around a plain text completion.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Content::text(text),
            model: "unknown".to_string(),
            stop_reason: Some("endTurn".to_string()),
        }
    }
}
