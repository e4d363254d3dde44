//! Server configuration records.
//!
//! Parsing configuration files is out of scope; an external loader hands
//! these plain records to [`crate::McpClient::add_server_config`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use conduit_mcp_transport::TransportConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerConfig {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default)]
        name: Option<String>,
    },
    Sse {
        base_url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        name: Option<String>,
    },
    Http {
        base_url: String,
        /// Optional RPC path appended to `base_url`.
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        name: Option<String>,
    },
    StreamableHttp {
        base_url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl ServerConfig {
    pub fn name(&self) -> Option<&str> {
        match self {
            ServerConfig::Stdio { name, .. }
            | ServerConfig::Sse { name, .. }
            | ServerConfig::Http { name, .. }
            | ServerConfig::StreamableHttp { name, .. } => name.as_deref(),
        }
    }

    pub fn headers(&self) -> HashMap<String, String> {
        match self {
            ServerConfig::Stdio { .. } => HashMap::new(),
            ServerConfig::Sse { headers, .. }
            | ServerConfig::Http { headers, .. }
            | ServerConfig::StreamableHttp { headers, .. } => headers.clone(),
        }
    }

    pub fn into_transport_config(self) -> TransportConfig {
        match self {
            ServerConfig::Stdio {
                command, args, env, ..
            } => {
                let mut vector = vec![command];
                vector.extend(args);
                TransportConfig::Stdio {
                    command: vector,
                    env,
                }
            }
            ServerConfig::Sse { base_url, .. } => TransportConfig::Sse { base_url },
            ServerConfig::Http {
                base_url, endpoint, ..
            } => {
                let base_url = match endpoint {
                    Some(endpoint) => format!(
                        "{}/{}",
                        base_url.trim_end_matches('/'),
                        endpoint.trim_start_matches('/')
                    ),
                    None => base_url,
                };
                TransportConfig::Http { base_url }
            }
            ServerConfig::StreamableHttp { base_url, .. } => {
                TransportConfig::Streamable { base_url }
            }
        }
    }
}
