use serde::{Deserialize, Serialize};

/// A client-declared workspace boundary.
///
/// Roots are owned by the client; mutating the roots list causes a
/// `notifications/roots/list_changed` to every connected server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Root {
    pub uri: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }

    pub fn named(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: Some(name.into()),
        }
    }
}

/// Result of the server-initiated `roots/list` request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListRootsResponse {
    pub roots: Vec<Root>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_serializes_without_empty_name() {
        let value = serde_json::to_value(Root::new("file:///workspace")).unwrap();
        assert_eq!(value, serde_json::json!({"uri": "file:///workspace"}));

        let named = serde_json::to_value(Root::named("file:///workspace", "ws")).unwrap();
        assert_eq!(named["name"], "ws");
    }
}
