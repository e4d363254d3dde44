//! Canonical server URL computation.
//!
//! The canonical form is the universal key for OAuth storage and the value
//! of the RFC 8707 `resource` parameter: lowercase scheme and host, default
//! ports stripped, trailing slash stripped when the path is empty, fragment
//! stripped.

use crate::error::AuthResult;
use url::Url;

pub fn canonicalize_server_url(raw: &str) -> AuthResult<String> {
    // Url::parse already lowercases scheme and host and drops explicit
    // default ports for known schemes.
    let mut url = Url::parse(raw.trim())?;
    url.set_fragment(None);

    let mut canonical = url.to_string();
    if url.path() == "/" && url.query().is_none() {
        canonical.truncate(canonical.len() - 1);
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_scheme_and_host() {
        assert_eq!(
            canonicalize_server_url("HTTPS://Example.COM/mcp").unwrap(),
            "https://example.com/mcp"
        );
    }

    #[test]
    fn strips_default_ports() {
        assert_eq!(
            canonicalize_server_url("https://example.com:443/mcp").unwrap(),
            "https://example.com/mcp"
        );
        assert_eq!(
            canonicalize_server_url("http://example.com:80").unwrap(),
            "http://example.com"
        );
        // Non-default ports survive.
        assert_eq!(
            canonicalize_server_url("http://example.com:8080/mcp").unwrap(),
            "http://example.com:8080/mcp"
        );
    }

    #[test]
    fn strips_trailing_slash_on_empty_path() {
        assert_eq!(
            canonicalize_server_url("https://example.com/").unwrap(),
            "https://example.com"
        );
        // A real path keeps its shape.
        assert_eq!(
            canonicalize_server_url("https://example.com/mcp/").unwrap(),
            "https://example.com/mcp/"
        );
    }

    #[test]
    fn strips_fragment() {
        assert_eq!(
            canonicalize_server_url("https://example.com/mcp#section").unwrap(),
            "https://example.com/mcp"
        );
    }

    #[test]
    fn canonicalization_is_idempotent() {
        for raw in [
            "HTTPS://Example.COM:443/",
            "http://host:8080/a/b#frag",
            "https://example.com/mcp?tenant=x",
        ] {
            let once = canonicalize_server_url(raw).unwrap();
            let twice = canonicalize_server_url(&once).unwrap();
            assert_eq!(once, twice);
        }
    }
}
