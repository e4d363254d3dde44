//! Transport auto-detection.
//!
//! Pure classification of a connection target into a transport choice; no
//! I/O happens here. Ambiguous HTTP(S) URLs come back as [`Detected::Probe`]
//! and the facade tries streamable HTTP, then SSE, then plain HTTP, keeping
//! the first that completes `initialize`.

use conduit_mcp_core::{McpError, McpResult};
use url::Url;

/// Executables recognized as MCP server launchers.
const KNOWN_COMMANDS: &[&str] = &[
    "npx", "node", "python", "python3", "ruby", "php", "java", "cargo", "go",
];

/// A connection target as supplied by the embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A command vector for a child process.
    Command(Vec<String>),
    /// A URL or command line.
    Text(String),
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target::Text(s.to_string())
    }
}

impl From<Vec<String>> for Target {
    fn from(v: Vec<String>) -> Self {
        Target::Command(v)
    }
}

/// The outcome of detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detected {
    Stdio { command: Vec<String> },
    Sse { url: String },
    StreamableHttp { url: String },
    Http { url: String },
    /// HTTP(S) URL with no distinguishing path: probe streamable, then SSE,
    /// then plain HTTP.
    Probe { url: String },
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn is_known_command(s: &str) -> bool {
    let basename = s.rsplit('/').next().unwrap_or(s);
    KNOWN_COMMANDS.contains(&basename)
}

/// Classify one target.
pub fn detect(target: &Target) -> McpResult<Detected> {
    match target {
        Target::Command(parts) => detect_command(parts),
        Target::Text(text) => detect_text(text),
    }
}

fn detect_command(parts: &[String]) -> McpResult<Detected> {
    if parts.is_empty() {
        return Err(McpError::TransportDetectionError {
            target: String::new(),
            message: "empty command vector".to_string(),
        });
    }
    let first_is_command = !is_http_url(&parts[0]) && is_known_command(&parts[0]);
    let no_urls = parts.iter().all(|p| !is_http_url(p));
    if first_is_command || no_urls {
        return Ok(Detected::Stdio {
            command: parts.to_vec(),
        });
    }
    Err(McpError::TransportDetectionError {
        target: parts.join(" "),
        message: "command vector mixes URLs and non-command tokens".to_string(),
    })
}

fn detect_text(text: &str) -> McpResult<Detected> {
    let text = text.trim();

    if let Some(rest) = text.strip_prefix("stdio://") {
        let command: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
        if command.is_empty() {
            return Err(McpError::TransportDetectionError {
                target: text.to_string(),
                message: "stdio:// target names no command".to_string(),
            });
        }
        return Ok(Detected::Stdio { command });
    }

    if is_http_url(text) {
        let url = Url::parse(text).map_err(|e| McpError::TransportDetectionError {
            target: text.to_string(),
            message: format!("invalid URL: {e}"),
        })?;
        let path = url.path().trim_end_matches('/');
        if path.ends_with("/sse") || path == "/sse" {
            return Ok(Detected::Sse {
                url: text.to_string(),
            });
        }
        if path.ends_with("/mcp") || path == "/mcp" {
            return Ok(Detected::StreamableHttp {
                url: text.to_string(),
            });
        }
        return Ok(Detected::Probe {
            url: text.to_string(),
        });
    }

    let command: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if command
        .first()
        .map(|first| is_known_command(first))
        .unwrap_or(false)
    {
        return Ok(Detected::Stdio { command });
    }

    Err(McpError::TransportDetectionError {
        target: text.to_string(),
        message: "target is neither an HTTP(S) URL, a stdio:// spec, nor a known command"
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Target {
        Target::Text(s.to_string())
    }

    #[test]
    fn command_vectors_with_known_executable_are_stdio() {
        let cases: Vec<Vec<&str>> = vec![
            vec!["python3", "demo.py"],
            vec!["npx", "-y", "@modelcontextprotocol/server-filesystem", "/tmp"],
            vec!["/usr/bin/node", "server.js"],
        ];
        for parts in cases {
            let target = Target::Command(parts.iter().map(|s| s.to_string()).collect());
            let detected = detect(&target).unwrap();
            assert!(matches!(detected, Detected::Stdio { .. }), "{parts:?}");
        }
    }

    #[test]
    fn command_vector_without_urls_is_stdio_even_if_unknown() {
        let detected = detect(&Target::Command(vec![
            "./my-server".to_string(),
            "--port".to_string(),
        ]))
        .unwrap();
        assert_eq!(
            detected,
            Detected::Stdio {
                command: vec!["./my-server".to_string(), "--port".to_string()]
            }
        );
    }

    #[test]
    fn stdio_scheme_prefix() {
        let detected = detect(&text("stdio://python3 server.py --fast")).unwrap();
        assert_eq!(
            detected,
            Detected::Stdio {
                command: vec![
                    "python3".to_string(),
                    "server.py".to_string(),
                    "--fast".to_string()
                ]
            }
        );
    }

    #[test]
    fn known_command_string_is_stdio() {
        assert!(matches!(
            detect(&text("node build/index.js")).unwrap(),
            Detected::Stdio { .. }
        ));
        assert!(matches!(
            detect(&text("go run ./cmd/server")).unwrap(),
            Detected::Stdio { .. }
        ));
    }

    #[test]
    fn sse_suffix_selects_sse() {
        assert_eq!(
            detect(&text("https://example.com/v1/sse")).unwrap(),
            Detected::Sse {
                url: "https://example.com/v1/sse".to_string()
            }
        );
        // Trailing slash tolerated.
        assert!(matches!(
            detect(&text("https://example.com/sse/")).unwrap(),
            Detected::Sse { .. }
        ));
    }

    #[test]
    fn mcp_suffix_selects_streamable() {
        assert_eq!(
            detect(&text("https://example.com/mcp")).unwrap(),
            Detected::StreamableHttp {
                url: "https://example.com/mcp".to_string()
            }
        );
    }

    #[test]
    fn other_urls_probe() {
        assert_eq!(
            detect(&text("https://example.com/api")).unwrap(),
            Detected::Probe {
                url: "https://example.com/api".to_string()
            }
        );
    }

    #[test]
    fn garbage_is_a_detection_error() {
        let err = detect(&text("totally-unknown-thing")).unwrap_err();
        assert!(matches!(err, McpError::TransportDetectionError { .. }));

        let err = detect(&Target::Command(vec![])).unwrap_err();
        assert!(matches!(err, McpError::TransportDetectionError { .. }));
    }
}
