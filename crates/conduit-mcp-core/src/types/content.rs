//! Content blocks carried by tool results, prompt messages and resources.

use crate::types::resources::ResourceAnnotations;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// A single content block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "image")]
    Image {
        /// Base64-encoded image bytes.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    #[serde(rename = "audio")]
    Audio(AudioContent),

    #[serde(rename = "resource_link")]
    ResourceLink(ResourceLink),

    #[serde(rename = "resource")]
    Resource { resource: ResourceContent },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Audio payload inside a tool result. Bytes travel base64-encoded since
/// stdio framing is line-oriented JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioContent {
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl AudioContent {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    /// Decode the base64 payload back into raw bytes.
    pub fn decode_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.data)
    }
}

/// A link to a resource, returned inside tool results without embedding
/// the resource body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceLink {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The body of a resource: either UTF-8 text or a base64 blob, never both
/// and never neither. The invariant holds by construction and is re-checked
/// when decoding wire data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResourceContentWire", into = "ResourceContentWire")]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: Option<String>,
    pub annotations: Option<ResourceAnnotations>,
    body: ResourceBody,
}

#[derive(Debug, Clone, PartialEq)]
enum ResourceBody {
    Text(String),
    Blob(String),
}

impl ResourceContent {
    pub fn text(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
            annotations: None,
            body: ResourceBody::Text(text.into()),
        }
    }

    pub fn blob(uri: impl Into<String>, blob: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
            annotations: None,
            body: ResourceBody::Blob(blob.into()),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            ResourceBody::Text(text) => Some(text),
            ResourceBody::Blob(_) => None,
        }
    }

    pub fn as_blob(&self) -> Option<&str> {
        match &self.body {
            ResourceBody::Blob(blob) => Some(blob),
            ResourceBody::Text(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ResourceContentWire {
    uri: String,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none", default)]
    mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    annotations: Option<ResourceAnnotations>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    blob: Option<String>,
}

impl TryFrom<ResourceContentWire> for ResourceContent {
    type Error = String;

    fn try_from(wire: ResourceContentWire) -> Result<Self, Self::Error> {
        let body = match (wire.text, wire.blob) {
            (Some(text), None) => ResourceBody::Text(text),
            (None, Some(blob)) => ResourceBody::Blob(blob),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "resource content '{}' carries both text and blob",
                    wire.uri
                ))
            }
            (None, None) => {
                return Err(format!(
                    "resource content '{}' carries neither text nor blob",
                    wire.uri
                ))
            }
        };
        Ok(Self {
            uri: wire.uri,
            mime_type: wire.mime_type,
            annotations: wire.annotations,
            body,
        })
    }
}

impl From<ResourceContent> for ResourceContentWire {
    fn from(content: ResourceContent) -> Self {
        let (text, blob) = match content.body {
            ResourceBody::Text(text) => (Some(text), None),
            ResourceBody::Blob(blob) => (None, Some(blob)),
        };
        Self {
            uri: content.uri,
            mime_type: content.mime_type,
            annotations: content.annotations,
            text,
            blob,
        }
    }
}
